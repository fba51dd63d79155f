use std::hash::{Hash, Hasher};

use ahash::AHasher;
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use reflecta::{CallInfo, Flags, MemberKind, ParamInfo, TypeBuilder, TypeHandle, TypeRegistry, Value};

#[derive(Default)]
struct Vehicle {
    wheels: u8,
    serial: String,
}

impl AsRef<Vehicle> for Truck {
    fn as_ref(&self) -> &Vehicle {
        &self.vehicle
    }
}

impl AsMut<Vehicle> for Truck {
    fn as_mut(&mut self) -> &mut Vehicle {
        &mut self.vehicle
    }
}

#[derive(Default)]
struct Truck {
    vehicle: Vehicle,
    payload: f64,
}

fn registry() -> TypeRegistry {
    let registry = TypeRegistry::new();
    registry.register(
        TypeBuilder::<Vehicle>::reference()
            .field("wheels", |v| &v.wheels, |v| &mut v.wheels)
            .private_field("serial", |v| &v.serial, |v| &mut v.serial)
            .property("Label", Some(|v: &Vehicle| format!("{}-{}", v.serial, v.wheels)), None)
            .method("honk", [], TypeHandle::void(), |_, _| Ok(Value::Null))
            .method(
                "repaint",
                [ParamInfo::of::<String>("colour"), ParamInfo::by_ref::<bool>("done")],
                TypeHandle::void(),
                |_, args| {
                    args[1] = Value::from(true);
                    Ok(Value::Null)
                },
            )
            .build(),
    );
    registry.register(
        TypeBuilder::<Truck>::reference()
            .inherits::<Vehicle>()
            .private_field("payload", |t| &t.payload, |t| &mut t.payload)
            .method("load", [ParamInfo::of::<f64>("tons")], TypeHandle::of::<f64>(), |truck, args| {
                truck.payload += args[0].get::<f64>().unwrap_or_default();
                Ok(Value::from(truck.payload))
            })
            .constructor([], |_| Ok(Truck::default()))
            .build(),
    );
    registry
}

fn hash_of(info: &CallInfo) -> u64 {
    let mut hasher = AHasher::default();
    info.hash(&mut hasher);
    hasher.finish()
}

fn scramble_case(rng: &mut StdRng, name: &str) -> String {
    name.chars()
        .map(|c| {
            if rng.gen_bool(0.5) {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            }
        })
        .collect()
}

#[test]
fn equal_fields_mean_equal_descriptors() {
    let truck = TypeHandle::of::<Truck>();
    let params = [TypeHandle::of::<String>(), TypeHandle::of::<bool>().by_ref()];
    let a = CallInfo::method(truck, "repaint", &params);
    let b = CallInfo::new(truck, Flags::INSTANCE_ANY_VISIBILITY, MemberKind::Method, "repaint", &params);
    assert_eq!(a, b);
    assert_eq!(hash_of(&a), hash_of(&b));
    assert_eq!(a.summed_hash(), b.summed_hash());

    assert_ne!(a, CallInfo::method(truck, "repaint", &[params[0], TypeHandle::of::<bool>()]));
    assert_ne!(a, a.with_target(TypeHandle::of::<Vehicle>()));
}

#[test]
fn randomized_by_name_descriptors_converge_with_member_descriptors() -> Result<()> {
    let registry = registry();
    let truck = TypeHandle::of::<Truck>();
    let vehicle = TypeHandle::of::<Vehicle>();
    let mut rng = StdRng::seed_from_u64(0x5eed_cafe);

    // (declaring type, kind, name, parameter types)
    let members: Vec<(TypeHandle, MemberKind, &str, Vec<TypeHandle>)> = vec![
        (vehicle, MemberKind::Field, "wheels", vec![]),
        (vehicle, MemberKind::Field, "serial", vec![]),
        (vehicle, MemberKind::Property, "Label", vec![]),
        (vehicle, MemberKind::Method, "honk", vec![]),
        (vehicle, MemberKind::Method, "repaint", vec![
            TypeHandle::of::<String>(),
            TypeHandle::of::<bool>().by_ref(),
        ]),
        (truck, MemberKind::Field, "payload", vec![]),
        (truck, MemberKind::Method, "load", vec![TypeHandle::of::<f64>()]),
        (truck, MemberKind::Constructor, "", vec![]),
    ];

    for round in 0..200 {
        let (declaring, kind, name, params) = members.choose(&mut rng).context("members")?;
        // Inherited members may be requested through the derived type.
        let target = if *declaring == vehicle && rng.gen_bool(0.5) {
            truck
        } else {
            *declaring
        };
        let (flags, requested) = if rng.gen_bool(0.5) && !name.is_empty() {
            (Flags::INSTANCE_ANY_VISIBILITY | Flags::IGNORE_CASE, scramble_case(&mut rng, name))
        } else {
            (Flags::INSTANCE_ANY_VISIBILITY, (*name).to_string())
        };
        let by_name = CallInfo::new(target, flags, *kind, &requested, params);
        let by_name = if *kind == MemberKind::Field && rng.gen_bool(0.3) {
            by_name.for_write()
        } else {
            by_name
        };

        let info = registry.require(*declaring)?;
        let member = match kind {
            MemberKind::Method => info.method_refs(name).first().copied(),
            MemberKind::Constructor => info.constructor_ref(0),
            _ => info.data_member_ref(name),
        }
        .context("declared member")?;
        let by_member = CallInfo::from_member(&registry, member)?
            .with_target(target)
            .with_read_operation(by_name.is_read_operation());

        let canonical = by_name.canonicalize(&registry)?;
        assert_eq!(canonical, by_member, "round {round}: {by_name}");
        assert_eq!(hash_of(&canonical), hash_of(&by_member), "round {round}");
        assert_eq!(canonical.canonicalize(&registry)?, canonical);
    }
    Ok(())
}
