//! Field value kinds the binder knows how to fill.

/// Broad shape of a bound value; picks the wording of validation messages.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ValueKind {
    Text,
    Number,
    Bool,
    List,
    Struct,
}

/// A single primitive field: string, boolean, integer or float.
pub trait Scalar: Send {
    /// Overwrites `self` from a raw wire string.
    ///
    /// Numbers that fail to parse become zero. Booleans only accept the
    /// literals `"true"` and `"false"`; anything else leaves them unchanged.
    fn assign(&mut self, raw: &str);

    /// Empty string, `false`, or numeric zero.
    fn is_zero(&self) -> bool;

    /// Numeric value, or character count for strings. Used by `min`/`max`.
    fn measure(&self) -> f64;

    fn render(&self) -> String;

    fn kind(&self) -> ValueKind;
}

impl Scalar for String {
    fn assign(&mut self, raw: &str) {
        raw.clone_into(self);
    }

    fn is_zero(&self) -> bool {
        self.is_empty()
    }

    fn measure(&self) -> f64 {
        self.chars().count() as f64
    }

    fn render(&self) -> String {
        self.clone()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Text
    }
}

impl Scalar for bool {
    fn assign(&mut self, raw: &str) {
        match raw {
            "true" => *self = true,
            "false" => *self = false,
            _ => {}
        }
    }

    fn is_zero(&self) -> bool {
        !*self
    }

    fn measure(&self) -> f64 {
        f64::from(u8::from(*self))
    }

    fn render(&self) -> String {
        self.to_string()
    }

    fn kind(&self) -> ValueKind {
        ValueKind::Bool
    }
}

macro_rules! numeric_scalar {
    ($($ty:ty),* $(,)?) => {$(
        impl Scalar for $ty {
            fn assign(&mut self, raw: &str) {
                *self = raw.parse::<$ty>().unwrap_or_default();
            }

            #[allow(clippy::float_cmp)]
            fn is_zero(&self) -> bool {
                *self == <$ty>::default()
            }

            #[allow(clippy::cast_lossless, clippy::cast_precision_loss)]
            fn measure(&self) -> f64 {
                *self as f64
            }

            fn render(&self) -> String {
                self.to_string()
            }

            fn kind(&self) -> ValueKind {
                ValueKind::Number
            }
        }
    )*};
}

numeric_scalar!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

/// A repeated field, read from the `name[]` wire key.
pub trait List: Send {
    /// Replaces the whole list, converting every raw value.
    fn assign_all(&mut self, raw: &[&str]);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn render_items(&self) -> Vec<String>;
}

impl<T: Scalar + Default> List for Vec<T> {
    fn assign_all(&mut self, raw: &[&str]) {
        *self = raw
            .iter()
            .map(|r| {
                let mut item = T::default();
                item.assign(r);
                item
            })
            .collect();
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn render_items(&self) -> Vec<String> {
        self.iter().map(Scalar::render).collect()
    }
}
