//! Field validation rules.

use super::value::{List, Scalar, ValueKind};

/// A constraint attached to a bound field.
///
/// `Min`, `Max` and `Len` compare the numeric value of number fields and the
/// length of strings (in characters) and lists. `OneOf` and `Email` compare
/// the rendered value; on lists they apply to every element.
#[derive(Clone, Debug, PartialEq)]
pub enum Rule {
    /// Not zero: non-empty string or list, `true`, non-zero number, or a
    /// present optional sub-structure.
    Required,
    Min(f64),
    Max(f64),
    Len(usize),
    OneOf(&'static [&'static str]),
    Email,
}

impl Rule {
    pub(crate) fn check_scalar(&self, value: &dyn Scalar) -> bool {
        match self {
            Self::Required => !value.is_zero(),
            Self::Min(n) => value.measure() >= *n,
            Self::Max(n) => value.measure() <= *n,
            #[allow(clippy::cast_precision_loss)]
            Self::Len(n) => (value.measure() - *n as f64).abs() < f64::EPSILON,
            Self::OneOf(options) => options.contains(&value.render().as_str()),
            Self::Email => value.kind() != ValueKind::Text || is_email(&value.render()),
        }
    }

    pub(crate) fn check_list(&self, value: &dyn List) -> bool {
        #[allow(clippy::cast_precision_loss)]
        let len = value.len() as f64;
        match self {
            Self::Required => !value.is_empty(),
            Self::Min(n) => len >= *n,
            Self::Max(n) => len <= *n,
            Self::Len(n) => value.len() == *n,
            Self::OneOf(options) => value
                .render_items()
                .iter()
                .all(|item| options.contains(&item.as_str())),
            Self::Email => value.render_items().iter().all(|item| is_email(item)),
        }
    }
}

/// Loose shape check: `local@domain.tld`, no whitespace.
fn is_email(s: &str) -> bool {
    let Some((local, domain)) = s.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && !s.chars().any(char::is_whitespace)
        && domain
            .split_once('.')
            .is_some_and(|(host, _)| !host.is_empty())
        && !domain.ends_with('.')
}
