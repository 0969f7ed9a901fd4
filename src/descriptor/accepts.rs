use super::{Literal, ScalarKind, TypeDescriptor, integral};

/// Class facts the accepts relation needs beyond the descriptors themselves.
pub trait ClassHierarchy {
    /// True for registered classes and enums.
    fn class_exists(&self, class: &str) -> bool;
    /// Reflexive: every class is a subclass of itself.
    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool;
}

/// Hierarchy with no classes; only identical names are related.
pub struct NoClasses;

impl ClassHierarchy for NoClasses {
    fn class_exists(&self, _class: &str) -> bool { false }
    fn is_subclass_of(&self, class: &str, ancestor: &str) -> bool { class == ancestor }
}

impl TypeDescriptor {
    /// Whether a value described by `inferred` may be stored where `self` is expected.
    pub fn accepts(&self, inferred: &TypeDescriptor, classes: &dyn ClassHierarchy) -> bool {
        use TypeDescriptor as T;

        // inferred unions (and `never`) are accepted member-wise
        if let T::Union(members) = inferred {
            return members.iter().all(|m| self.accepts(m, classes));
        }

        match self {
            T::Mixed => true,
            T::Union(arms) => arms.iter().any(|a| a.accepts(inferred, classes)),
            T::TypeParam(_) => false,

            T::Null => matches!(inferred, T::Null),

            T::Literal(expected) => match (expected, inferred) {
                (Literal::Float(f), T::Literal(Literal::Int(i))) => f.0 == *i as f64,
                (_, T::Literal(lit)) => expected == lit,
                _ => false,
            },

            T::Scalar(kind) => scalar_accepts(*kind, inferred),

            T::IntRange { min, max } => match inferred {
                T::Literal(lit) => lit.as_integral().is_some_and(|n| in_range(n, *min, *max)),
                T::IntRange { min: lo, max: hi } => lower_covers(*min, *lo) && upper_covers(*max, *hi),
                _ => false,
            },

            T::ClassString { bound } => match inferred {
                T::Literal(Literal::String(name)) => {
                    classes.class_exists(name)
                        && bound.as_ref().is_none_or(|b| classes.is_subclass_of(name, b))
                }
                T::ClassString { bound: narrower } => match (bound, narrower) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(b), Some(n)) => classes.is_subclass_of(n, b),
                },
                _ => false,
            },

            T::ArrayOf { key, value } => match inferred {
                T::ArrayOf { key: k, value: v } => key_accepts(key, k, classes) && value.accepts(v, classes),
                T::ArrayShape(elements) => elements.iter().enumerate().all(|(i, e)| {
                    key_accepts(key, &T::Literal(Literal::Int(i as i64)), classes) && value.accepts(e, classes)
                }),
                _ => false,
            },

            T::ArrayShape(elements) => match inferred {
                T::ArrayShape(others) => {
                    elements.len() == others.len()
                        && elements.iter().zip(others).all(|(e, o)| e.accepts(o, classes))
                }
                _ => false,
            },

            T::ObjectAny => matches!(
                inferred,
                T::ObjectAny | T::Class { .. } | T::Enum(_) | T::EnumCase { .. }
            ),

            T::Class { name, args } => match inferred {
                T::Class { name: other, args: other_args } => {
                    classes.is_subclass_of(other, name)
                        && (args.is_empty()
                            || other_args.is_empty()
                            || args.len() != other_args.len()
                            || args.iter().zip(other_args).all(|(a, o)| a.accepts(o, classes)))
                }
                _ => false,
            },

            T::Enum(name) => match inferred {
                T::Enum(other) | T::EnumCase { name: other, .. } => name == other,
                _ => false,
            },

            T::EnumCase { .. } => self == inferred,
        }
    }
}

/// Acceptance in key position: an integer key also counts as its decimal
/// string form, since object keys arrive as strings.
pub(crate) fn key_accepts(expected: &TypeDescriptor, inferred: &TypeDescriptor, classes: &dyn ClassHierarchy) -> bool {
    match inferred {
        TypeDescriptor::Union(members) => members.iter().all(|m| key_accepts(expected, m, classes)),
        TypeDescriptor::Literal(Literal::Int(i)) => {
            expected.accepts(inferred, classes)
                || expected.accepts(&TypeDescriptor::Literal(Literal::String(i.to_string())), classes)
        }
        _ => expected.accepts(inferred, classes),
    }
}

fn scalar_accepts(kind: ScalarKind, inferred: &TypeDescriptor) -> bool {
    use TypeDescriptor as T;
    match (kind, inferred) {
        (ScalarKind::Int, T::Literal(Literal::Int(_))) => true,
        (ScalarKind::Int, T::Literal(Literal::Float(f))) => integral(f.0).is_some(),
        (ScalarKind::Int, T::IntRange { .. }) => true,
        (ScalarKind::Float, T::Literal(Literal::Int(_) | Literal::Float(_))) => true,
        (ScalarKind::Float, T::IntRange { .. }) => true,
        (ScalarKind::Float, T::Scalar(ScalarKind::Int)) => true,
        (ScalarKind::String, T::Literal(Literal::String(_))) => true,
        (ScalarKind::String, T::ClassString { .. }) => true,
        (ScalarKind::Bool, T::Literal(Literal::Bool(_))) => true,
        (k, T::Scalar(other)) => k == *other,
        _ => false,
    }
}

fn in_range(n: i64, min: Option<i64>, max: Option<i64>) -> bool {
    min.is_none_or(|m| n >= m) && max.is_none_or(|m| n <= m)
}

// `None` is -inf for lower bounds and +inf for upper bounds.
fn lower_covers(outer: Option<i64>, inner: Option<i64>) -> bool {
    match (outer, inner) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(o), Some(i)) => o <= i,
    }
}

fn upper_covers(outer: Option<i64>, inner: Option<i64>) -> bool {
    match (outer, inner) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(o), Some(i)) => i <= o,
    }
}
