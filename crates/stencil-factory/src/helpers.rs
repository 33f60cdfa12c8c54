//! Ready-made generators for common fixture values.
//!
//! Every helper returns an ordinary [`Generator`]; nothing here is special
//! to the resolution engine. Helpers that create related documents hold a
//! [`Weak`] handle on the [`Registry`] so a blueprint never keeps its own
//! registry alive.

use std::ops::Range;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, NaiveDate, SecondsFormat, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use stencil_lazy::{Attr, AttributeSpec, Embed, Generator, LazyError, LazyResult, Scope};
use stencil_types::{Document, DocumentId, Value, ID_FIELD};

use crate::error::DeclarationError;
use crate::registry::Registry;

// ---------------------------------------------------------------------------
// Sequences and derived values
// ---------------------------------------------------------------------------

/// A counter starting at 1, advanced once per built document, mapped
/// through `f`.
///
/// The counter lives in the generator, so every document built from
/// definitions sharing it sees the next number.
pub fn sequence<F, T>(f: F) -> Generator
where
    F: Fn(u64) -> T + Send + Sync + 'static,
    T: Into<Value>,
{
    let counter = AtomicU64::new(0);
    Generator::new(move |_| Ok(f(counter.fetch_add(1, Ordering::Relaxed) + 1).into()))
}

/// `sequence` yielding the bare number.
pub fn counter() -> Generator {
    sequence(|n| n)
}

/// A value computed from the node the generator sits in.
pub fn dependent<F, T>(f: F) -> Generator
where
    F: Fn(&mut Scope<'_, '_>) -> LazyResult<T> + Send + Sync + 'static,
    T: Into<Value>,
{
    Generator::new(move |scope| f(scope).map(Into::into))
}

/// Embed `fragment` with extra inline traits.
pub fn embed<I, S>(fragment: impl Into<String>, traits: I) -> Attr
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Attr::Embed(Embed::new(fragment).with_traits(traits))
}

// ---------------------------------------------------------------------------
// Random values
// ---------------------------------------------------------------------------

/// Character classes for [`random_text`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextOptions {
    pub upper: bool,
    pub lower: bool,
    pub digits: bool,
    pub spaces: bool,
    pub extra: Vec<char>,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            upper: true,
            lower: true,
            digits: false,
            spaces: false,
            extra: Vec::new(),
        }
    }
}

impl TextOptions {
    fn charset(&self) -> Vec<char> {
        let mut chars = Vec::new();
        if self.upper {
            chars.extend('A'..='Z');
        }
        if self.lower {
            chars.extend('a'..='z');
        }
        if self.spaces {
            chars.push(' ');
        }
        if self.digits {
            chars.extend('0'..='9');
        }
        chars.extend(self.extra.iter().copied());
        chars
    }
}

/// Random ASCII letters of length `len`.
pub fn text(len: usize) -> Generator {
    random_text(len, TextOptions::default())
}

/// Random text of length `len` drawn from the classes in `options`.
pub fn random_text(len: usize, options: TextOptions) -> Generator {
    let charset = options.charset();
    Generator::new(move |_| {
        if charset.is_empty() && len > 0 {
            return Err(LazyError::message("random_text: empty character set"));
        }
        let mut rng = rand::thread_rng();
        let text: String = (0..len)
            .filter_map(|_| charset.choose(&mut rng).copied())
            .collect();
        Ok(Value::String(text))
    })
}

/// One of `values`, picked at random per document.
pub fn one_of<I, T>(values: I) -> Generator
where
    I: IntoIterator<Item = T>,
    T: Into<Value>,
{
    let values: Vec<Value> = values.into_iter().map(Into::into).collect();
    Generator::new(move |_| {
        values
            .choose(&mut rand::thread_rng())
            .cloned()
            .ok_or_else(|| LazyError::message("one_of: no values to choose from"))
    })
}

/// A random integer in the half-open `range`.
pub fn random_number(range: Range<i64>) -> Generator {
    Generator::new(move |_| {
        if range.is_empty() {
            return Err(LazyError::message(format!(
                "random_number: empty range {}..{}",
                range.start, range.end
            )));
        }
        Ok(Value::from(rand::thread_rng().gen_range(range.clone())))
    })
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

/// A list of `len` values, each from a fresh call of `generator`.
pub fn list_of(generator: Generator, len: usize) -> Generator {
    Generator::new(move |scope| {
        let items = (0..len)
            .map(|_| generator.call(scope))
            .collect::<LazyResult<Vec<_>>>()?;
        Ok(Value::Array(items))
    })
}

/// Concatenation of the lists produced by `generators`.
pub fn union(generators: Vec<Generator>) -> Generator {
    Generator::new(move |scope| {
        let mut out = Vec::new();
        for generator in &generators {
            match generator.call(scope)? {
                Value::Array(items) => out.extend(items),
                other => {
                    return Err(LazyError::ShapeMismatch {
                        path: scope.path().to_string(),
                        expected: "a list",
                        actual: stencil_types::document::type_name(&other),
                    })
                }
            }
        }
        Ok(Value::Array(out))
    })
}

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// A span of time relative to "now". Months count as 30 days and years as
/// 365.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Offset {
    pub years: i64,
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

impl Offset {
    pub fn years(years: i64) -> Self {
        Self { years, ..Self::default() }
    }

    pub fn months(months: i64) -> Self {
        Self { months, ..Self::default() }
    }

    pub fn days(days: i64) -> Self {
        Self { days, ..Self::default() }
    }

    pub fn hours(hours: i64) -> Self {
        Self { hours, ..Self::default() }
    }

    pub fn minutes(minutes: i64) -> Self {
        Self { minutes, ..Self::default() }
    }

    pub fn to_duration(&self) -> Duration {
        let days = self.days + self.weeks * 7 + self.months * 30 + self.years * 365;
        Duration::days(days)
            + Duration::hours(self.hours)
            + Duration::minutes(self.minutes)
            + Duration::seconds(self.seconds)
    }
}

fn timestamp(at: DateTime<Utc>) -> Value {
    Value::String(at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// The time of building, as an RFC 3339 UTC string.
pub fn now() -> Generator {
    Generator::new(|_| Ok(timestamp(Utc::now())))
}

/// A fixed instant.
pub fn at(instant: DateTime<Utc>) -> Generator {
    Generator::new(move |_| Ok(timestamp(instant)))
}

/// Midnight UTC on the given calendar date.
pub fn date(year: i32, month: u32, day: u32) -> Result<Generator, DeclarationError> {
    let instant = NaiveDate::from_ymd_opt(year, month, day)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or(DeclarationError::InvalidDate { year, month, day })?
        .and_utc();
    Ok(at(instant))
}

/// `offset` before the time of building.
pub fn ago(offset: Offset) -> Generator {
    let span = offset.to_duration();
    Generator::new(move |_| Ok(timestamp(Utc::now() - span)))
}

/// `offset` after the time of building.
pub fn from_now(offset: Offset) -> Generator {
    let span = offset.to_duration();
    Generator::new(move |_| Ok(timestamp(Utc::now() + span)))
}

// ---------------------------------------------------------------------------
// Identifiers and related documents
// ---------------------------------------------------------------------------

/// A fresh identifier string, not tied to any store.
pub fn object_id() -> Generator {
    Generator::new(|_| Ok(DocumentId::new().to_value()))
}

/// Handle on a related document, created through the registry when the
/// referencing position is first read.
struct Related {
    registry: Weak<Registry>,
    blueprint: String,
    document: Option<String>,
    overrides: AttributeSpec,
}

impl Related {
    fn new(
        registry: &Arc<Registry>,
        blueprint: impl Into<String>,
        document: Option<&str>,
        overrides: AttributeSpec,
    ) -> Self {
        Self {
            registry: Arc::downgrade(registry),
            blueprint: blueprint.into(),
            document: document.map(str::to_string),
            overrides,
        }
    }

    fn registry(&self) -> LazyResult<Arc<Registry>> {
        self.registry.upgrade().ok_or_else(|| {
            LazyError::message(format!(
                "registry dropped before related `{}` document could be created",
                self.blueprint
            ))
        })
    }

    fn create(&self, registry: &Registry) -> LazyResult<Value> {
        let record: Document = registry
            .create(&self.blueprint, self.document.as_deref(), &self.overrides)
            .map_err(LazyError::generator)?;
        record.get(ID_FIELD).cloned().ok_or_else(|| {
            LazyError::message(format!(
                "`{}` store returned a record without `{ID_FIELD}`",
                self.blueprint
            ))
        })
    }
}

/// Create a `blueprint` document and use its `_id`.
///
/// Override generators run in the related document, not the referencing
/// one.
pub fn id_of(
    registry: &Arc<Registry>,
    blueprint: impl Into<String>,
    document: Option<&str>,
    overrides: AttributeSpec,
) -> Generator {
    let related = Related::new(registry, blueprint, document, overrides);
    Generator::new(move |_| related.create(&*related.registry()?))
}

/// Create a `blueprint` document and use a `{"$id", "$ref"}` reference to
/// it, `$ref` being the store's collection.
pub fn ref_to(
    registry: &Arc<Registry>,
    blueprint: impl Into<String>,
    document: Option<&str>,
    overrides: AttributeSpec,
) -> Generator {
    let related = Related::new(registry, blueprint, document, overrides);
    Generator::new(move |_| {
        let registry = related.registry()?;
        let id = related.create(&registry)?;
        let collection = registry
            .get(&related.blueprint)
            .map_err(LazyError::generator)?
            .collection()
            .map(str::to_string)
            .unwrap_or_default();
        let mut reference = Document::new();
        reference.insert("$id".to_string(), id);
        reference.insert("$ref".to_string(), Value::String(collection));
        Ok(Value::Object(reference))
    })
}
