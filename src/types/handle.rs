use std::any::TypeId;
use std::hash::{Hash, Hasher};

/// Identity of a reflected type.
///
/// Two handles are equal iff they name the same Rust type and agree on the
/// by-reference marker; the display name is informational only.
#[derive(Clone, Copy)]
pub struct TypeHandle {
    id: TypeId,
    name: &'static str,
    by_ref: bool,
}

impl TypeHandle {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
            by_ref: false,
        }
    }

    /// Handle used for members that return nothing.
    pub fn void() -> Self {
        Self::of::<()>()
    }

    /// The same type, passed by reference (mutations flow back to the caller).
    pub fn by_ref(self) -> Self {
        Self {
            by_ref: true,
            ..self
        }
    }

    /// Strips the by-reference marker.
    pub fn element(self) -> Self {
        Self {
            by_ref: false,
            ..self
        }
    }

    pub fn is_by_ref(&self) -> bool {
        self.by_ref
    }

    pub fn is_void(&self) -> bool {
        self.id == TypeId::of::<()>()
    }

    pub fn id(&self) -> TypeId {
        self.id
    }

    /// Fully qualified Rust type name.
    pub fn full_name(&self) -> &'static str {
        self.name
    }

    /// Type name with module paths removed, e.g. `Vec<i32>`.
    pub fn name(&self) -> String {
        short_name(self.name)
    }
}

impl PartialEq for TypeHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && self.by_ref == other.by_ref
    }
}

impl Eq for TypeHandle {}

impl Hash for TypeHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
        self.by_ref.hash(state);
    }
}

impl std::fmt::Display for TypeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())?;
        if self.by_ref {
            f.write_str("&")?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for TypeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypeHandle({self})")
    }
}

/// Renders a list of handles as a comma separated signature.
pub fn signature(types: &[TypeHandle]) -> String {
    types
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn short_name(full: &str) -> String {
    let mut out = String::with_capacity(full.len());
    let mut segment_start = 0;
    for (index, ch) in full.char_indices() {
        if matches!(ch, '<' | '>' | ',' | ' ' | '[' | ']' | ';' | '(' | ')' | '&') {
            out.push_str(last_path_segment(&full[segment_start..index]));
            out.push(ch);
            segment_start = index + ch.len_utf8();
        }
    }
    out.push_str(last_path_segment(&full[segment_start..]));
    out
}

fn last_path_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}
