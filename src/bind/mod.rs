//! Request binding: payload → typed structure → defaults → validation.
//!
//! # Describing a target
//!
//! There is no runtime reflection. A bindable type implements [`Bind`] and
//! lists its fields once, with their wire names, defaults and rules:
//!
//! ```rust
//! use kite::bind::{Bind, Field, Rule};
//!
//! #[derive(Default, serde::Deserialize)]
//! #[serde(default)]
//! struct Signup {
//!     name: String,
//!     age: i64,
//!     tags: Vec<String>,
//!     newsletter: bool,
//! }
//!
//! impl Bind for Signup {
//!     fn fields(&mut self) -> Vec<Field<'_>> {
//!         vec![
//!             Field::new("name", &mut self.name).rule(Rule::Required),
//!             Field::new("age", &mut self.age).default("18").rule(Rule::Min(0.0)),
//!             Field::list("tags", &mut self.tags),
//!             Field::new("newsletter", &mut self.newsletter).default("true"),
//!         ]
//!     }
//! }
//! ```
//!
//! # Pipeline
//!
//! 1. **Extract.** JSON bodies are decoded wholesale with serde. Form bodies
//!    and query strings are walked field by field: scalars read `name`,
//!    lists read every `name[]`. Missing keys leave the field untouched.
//! 2. **Defaults.** Every field still at its zero value (`""`, `false`, `0`)
//!    that carries a default gets it. An explicit `0`/`false`/`""` on the
//!    wire is indistinguishable from an absent one and is overwritten too,
//!    and a boolean default can only turn `false` into `true`.
//! 3. **Validate.** Rules run depth-first in declaration order; the first
//!    violation is returned, translated, with its field name.

mod translate;
mod validate;
mod value;
mod values;

pub use translate::{Lang, Translator, Violation};
pub use validate::Rule;
pub use value::{List, Scalar, ValueKind};
pub use values::Values;

/// A structure the binder can fill.
pub trait Bind: Send {
    /// Describes every field in declaration order.
    fn fields(&mut self) -> Vec<Field<'_>>;
}

/// Mutable view of one field of a [`Bind`] target.
pub enum Slot<'a> {
    Scalar(&'a mut dyn Scalar),
    List(&'a mut dyn List),
    Nested(&'a mut dyn Bind),
    /// An optional sub-structure that is currently `None`.
    Absent,
}

/// One field of a [`Bind`] target plus its binding metadata.
pub struct Field<'a> {
    name: &'static str,
    default: Option<&'static str>,
    rules: Vec<Rule>,
    exported: bool,
    slot: Slot<'a>,
}

impl<'a> Field<'a> {
    fn with_slot(name: &'static str, slot: Slot<'a>) -> Self {
        Self { name, default: None, rules: Vec::new(), exported: true, slot }
    }

    /// A string, boolean or numeric field.
    pub fn new<T: Scalar>(name: &'static str, value: &'a mut T) -> Self {
        Self::with_slot(name, Slot::Scalar(value))
    }

    /// A repeated field, read from the `name[]` key.
    pub fn list<T: List>(name: &'static str, value: &'a mut T) -> Self {
        Self::with_slot(name, Slot::List(value))
    }

    /// An embedded structure. Its fields read from the same flat key space.
    pub fn nested<T: Bind>(name: &'static str, value: &'a mut T) -> Self {
        Self::with_slot(name, Slot::Nested(value))
    }

    /// An optional sub-structure; walked only when `Some`.
    pub fn optional<T: Bind>(name: &'static str, value: &'a mut Option<T>) -> Self {
        let slot = match value {
            Some(inner) => Slot::Nested(inner),
            None => Slot::Absent,
        };
        Self::with_slot(name, slot)
    }

    /// Value assigned when the field is still zero after extraction.
    pub fn default(mut self, value: &'static str) -> Self {
        self.default = Some(value);
        self
    }

    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Excludes the field from extraction, defaults and validation.
    pub fn hidden(mut self) -> Self {
        self.exported = false;
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

/// Binding failures.
#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("unsupported request: {method} with content type `{content_type}`")]
    Unsupported { method: String, content_type: String },

    #[error("invalid json body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid form data: {0}")]
    Form(#[from] serde_urlencoded::de::Error),

    /// First failed rule. Displays as the translated message alone.
    #[error("{message}")]
    Validation { field: String, message: String },
}

/// Copies values from `values` onto `target`, field by field.
pub fn extract(target: &mut dyn Bind, values: &Values) {
    for field in target.fields() {
        if !field.exported {
            continue;
        }
        match field.slot {
            Slot::Scalar(value) => {
                if let Some(raw) = values.first(field.name) {
                    value.assign(raw);
                }
            }
            Slot::List(list) => {
                let raw = values.all(&format!("{}[]", field.name));
                if !raw.is_empty() {
                    list.assign_all(&raw);
                }
            }
            Slot::Nested(inner) => extract(inner, values),
            Slot::Absent => {}
        }
    }
}

/// Fills zero-valued fields from their declared defaults.
pub fn apply_defaults(target: &mut dyn Bind) {
    for field in target.fields() {
        if !field.exported {
            continue;
        }
        match field.slot {
            Slot::Scalar(value) => {
                if let Some(default) = field.default {
                    if value.is_zero() {
                        value.assign(default);
                    }
                }
            }
            Slot::Nested(inner) => apply_defaults(inner),
            Slot::List(_) | Slot::Absent => {}
        }
    }
}

/// Runs every rule; returns the first violation, translated.
pub fn validate(target: &mut dyn Bind, translator: &dyn Translator) -> Result<(), BindError> {
    validate_at(target, "", translator)
}

fn validate_at(target: &mut dyn Bind, prefix: &str, tr: &dyn Translator) -> Result<(), BindError> {
    for field in target.fields() {
        if !field.exported {
            continue;
        }
        let path = if prefix.is_empty() {
            field.name.to_owned()
        } else {
            format!("{prefix}.{}", field.name)
        };

        let failed = match &field.slot {
            Slot::Scalar(value) => field
                .rules
                .iter()
                .find(|r| !r.check_scalar(&**value))
                .map(|r| (r, value.kind())),
            Slot::List(list) => field
                .rules
                .iter()
                .find(|r| !r.check_list(&**list))
                .map(|r| (r, ValueKind::List)),
            Slot::Absent => field
                .rules
                .iter()
                .find(|r| **r == Rule::Required)
                .map(|r| (r, ValueKind::Struct)),
            Slot::Nested(_) => None,
        };
        if let Some((rule, kind)) = failed {
            let message = tr.translate(&Violation { field: &path, rule, kind });
            return Err(BindError::Validation { field: path, message });
        }

        if let Slot::Nested(inner) = field.slot {
            validate_at(inner, &path, tr)?;
        }
    }
    Ok(())
}

/// Extract, default and validate in one pass over form/query values.
pub fn bind_values(
    target: &mut dyn Bind,
    values: &Values,
    translator: &dyn Translator,
) -> Result<(), BindError> {
    extract(target, values);
    apply_defaults(target);
    validate(target, translator)
}
