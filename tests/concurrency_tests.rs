use std::sync::Arc;

use anyhow::Result;
use crossbeam_utils::thread;
use reflecta::{
    CallInfo, LockStrategy, ParamInfo, ReflectConfig, ReflectContext, TypeBuilder, TypeHandle,
    Value, arg,
};
use reflecta_utils::logging::init_test_logging;

#[derive(Debug, Default)]
struct Tally {
    hits: u64,
}

const THREADS: usize = 8;
const ROUNDS: usize = 200;

fn context(lock_strategy: LockStrategy) -> ReflectContext {
    init_test_logging();
    let context = ReflectContext::with_config(ReflectConfig {
        lock_strategy,
        ..ReflectConfig::default()
    });
    context.register(
        TypeBuilder::<Tally>::reference()
            .field("hits", |t| &t.hits, |t| &mut t.hits)
            .method("add", [ParamInfo::of::<u64>("by")], TypeHandle::void(), |tally, args| {
                tally.hits += arg::<u64>(args, 0)?;
                Ok(Value::Null)
            })
            .build(),
    );
    context
}

#[test]
fn racing_first_requests_synthesize_once() -> Result<()> {
    for strategy in [LockStrategy::Monitor, LockStrategy::ReaderWriter] {
        let context = context(strategy);
        let add = CallInfo::method(TypeHandle::of::<Tally>(), "add", &[TypeHandle::of::<u64>()]);
        let hits = CallInfo::field(TypeHandle::of::<Tally>(), "hits");
        let tally = Value::object(Tally::default());

        let (shared, add, hits, tally) = (&context, &add, &hits, &tally);
        let outcomes = thread::scope(|scope| {
            let workers: Vec<_> = (0..THREADS)
                .map(|_| {
                    scope.spawn(move |_| -> reflecta::Result<()> {
                        let invoke = shared.delegate_for_method(add)?;
                        let read = shared.delegate_for_getter(hits)?;
                        for _ in 0..ROUNDS {
                            invoke(tally, &mut [Value::from(1_u64)])?;
                            read(tally)?;
                        }
                        Ok(())
                    })
                })
                .collect();
            workers.into_iter().map(|worker| worker.join()).collect::<Vec<_>>()
        })
        .map_err(|_| anyhow::anyhow!("scope panicked"))?;
        for outcome in outcomes {
            outcome.map_err(|_| anyhow::anyhow!("worker thread panicked"))??;
        }

        let stats = context.stats();
        assert_eq!(stats.created, 2, "{strategy:?}");
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, (THREADS as u64 - 1) * 2);
        let total = context.delegate_for_getter(hits)?(tally)?.get::<u64>();
        assert_eq!(total, Some((THREADS * ROUNDS) as u64));
    }
    Ok(())
}

#[test]
fn handles_are_shared_across_threads() -> Result<()> {
    let mut context = context(LockStrategy::Monitor);
    let hits = CallInfo::field(TypeHandle::of::<Tally>(), "hits");
    let first = context.delegate(&hits, reflecta::CacheStrategy::Permanent)?;

    context.set_lock_strategy(LockStrategy::ReaderWriter);
    let (context, hits) = (&context, &hits);
    let seen = thread::scope(|scope| {
        let workers: Vec<_> = (0..THREADS)
            .map(|_| scope.spawn(move |_| context.delegate(hits, reflecta::CacheStrategy::Permanent)))
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().map_err(|_| anyhow::anyhow!("worker thread panicked")))
            .collect::<Result<Vec<_>>>()
    })
    .map_err(|_| anyhow::anyhow!("scope panicked"))??;

    for thunk in seen {
        assert!(Arc::ptr_eq(&thunk?, &first));
    }
    assert_eq!(context.count(), 1);
    Ok(())
}
