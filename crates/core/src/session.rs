//! Cache-aside sessions
//!
//! A [`Session`] is a single-use pipeline bound to one collection. Read steps
//! ([`get`](Session::get), [`filter`](Session::filter)) resolve a key from the
//! collection or, on a miss, from ordered fallback getters, and leave a
//! pending result behind. A finalizer ([`exec`](Session::exec),
//! [`outcome`](Session::outcome)) consumes the session and hands the result
//! back.
//!
//! The session state is a `Result`: once it holds an error every further
//! step is a no-op and the finalizer reports that same error. Write
//! operations ([`upsert`](Session::upsert), [`upserts`](Session::upserts),
//! [`delete`](Session::delete)) also consume the session and return directly.
//!
//! Fallback getters and setters receive the composite key
//! `"<collection>.<key>"`. They run synchronously on the caller's thread.

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use smartcache_common::time::{Clock, SystemClock};
use tracing::{debug, warn};

use crate::collection::Collection;
use crate::error::{CacheError, CacheResult, CollaboratorErrors, SourceError};
use crate::value::CacheValue;

/// Fallback reader: `Ok(Some(_))` is a hit, `Ok(None)` means the source has
/// nothing for this key, `Err(_)` means "try the next fallback"
pub type Getter<'f, V> = &'f dyn Fn(&str) -> Result<Option<V>, SourceError>;

/// Fallback writer: mirrors a local write (`Some`) or delete (`None`)
pub type Setter<'f, V> = &'f dyn Fn(&str, Option<&V>) -> Result<(), SourceError>;

/// Element test for predicated reads: `(element, index) -> matches`
pub type Predicate<'f, T> = &'f dyn Fn(&T, usize) -> bool;

/// Result of the last read step of a session
pub enum Outcome<V: CacheValue> {
    /// The whole stored (or fetched) value
    Value(V),
    /// First element matching a `get` predicate
    Element(V::Item),
    /// Every element matching a `filter` predicate, in order
    Elements(Vec<V::Item>),
}

impl<V> Outcome<V>
where
    V: CacheValue + Serialize,
    V::Item: Serialize,
{
    fn to_json(&self) -> serde_json::Result<Value> {
        match self {
            Self::Value(value) => serde_json::to_value(value),
            Self::Element(item) => serde_json::to_value(item),
            Self::Elements(items) => serde_json::to_value(items),
        }
    }
}

impl<V> Clone for Outcome<V>
where
    V: CacheValue,
{
    fn clone(&self) -> Self {
        match self {
            Self::Value(value) => Self::Value(value.clone()),
            Self::Element(item) => Self::Element(item.clone()),
            Self::Elements(items) => Self::Elements(items.clone()),
        }
    }
}

impl<V> fmt::Debug for Outcome<V>
where
    V: CacheValue + fmt::Debug,
    V::Item: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Self::Element(item) => f.debug_tuple("Element").field(item).finish(),
            Self::Elements(items) => f.debug_tuple("Elements").field(items).finish(),
        }
    }
}

impl<V> PartialEq for Outcome<V>
where
    V: CacheValue + PartialEq,
    V::Item: PartialEq,
{
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Value(a), Self::Value(b)) => a == b,
            (Self::Element(a), Self::Element(b)) => a == b,
            (Self::Elements(a), Self::Elements(b)) => a == b,
            _ => false,
        }
    }
}

/// Single-use cache-aside controller bound to one collection
#[must_use = "a session does nothing until it is finalized"]
pub struct Session<V = Value, C = SystemClock>
where
    V: CacheValue,
    C: Clock,
{
    state: CacheResult<Arc<Collection<V, C>>>,
    pending: Option<Outcome<V>>,
}

impl<V, C> Session<V, C>
where
    V: CacheValue,
    C: Clock,
{
    pub(crate) fn bound(collection: Arc<Collection<V, C>>) -> Self {
        Self { state: Ok(collection), pending: None }
    }

    pub(crate) fn failed(error: CacheError) -> Self {
        Self { state: Err(error), pending: None }
    }

    /// The sticky error, if the session carries one
    pub fn error(&self) -> Option<&CacheError> {
        self.state.as_ref().err()
    }

    /// The bound collection, `None` for an error-carrying session
    pub fn collection(&self) -> Option<&Collection<V, C>> {
        self.state.as_deref().ok()
    }

    /// Key passed to fallbacks for `key`: `"<collection>.<key>"`
    pub fn composite_key(&self, key: &str) -> Option<String> {
        self.collection().map(|collection| collection.composite_key(key))
    }

    /// Whether the last read step produced a result
    pub fn is_hit(&self) -> bool {
        self.pending.is_some()
    }

    /// Read `key`, falling back to `fallbacks` in order on a miss
    ///
    /// A value found through a fallback is stored in the collection before it
    /// is used. With a `predicate`, the pending result is the first matching
    /// element of the sequence; a non-sequence value or no match is a miss.
    pub fn get(
        mut self,
        key: &str,
        predicate: Option<Predicate<'_, V::Item>>,
        fallbacks: &[Getter<'_, V>],
    ) -> Self {
        let Ok(collection) = &self.state else {
            return self;
        };

        self.pending = resolve(collection, key, fallbacks).and_then(|value| match predicate {
            None => Some(Outcome::Value(value)),
            Some(predicate) => value.items().and_then(|items| {
                items
                    .iter()
                    .enumerate()
                    .find(|(index, item)| predicate(*item, *index))
                    .map(|(_, item)| Outcome::Element(item.clone()))
            }),
        });
        self
    }

    /// Read `key` like [`get`](Self::get), keeping every element that matches
    /// `predicate`
    ///
    /// Order is preserved. No matching element yields an empty result, which
    /// is still a hit. Without a predicate this is a plain `get`.
    pub fn filter(
        mut self,
        key: &str,
        predicate: Option<Predicate<'_, V::Item>>,
        fallbacks: &[Getter<'_, V>],
    ) -> Self {
        let Some(predicate) = predicate else {
            return self.get(key, None, fallbacks);
        };
        let Ok(collection) = &self.state else {
            return self;
        };

        self.pending = resolve(collection, key, fallbacks).and_then(|value| {
            value.items().map(|items| {
                Outcome::Elements(
                    items
                        .iter()
                        .enumerate()
                        .filter(|(index, item)| predicate(*item, *index))
                        .map(|(_, item)| item.clone())
                        .collect(),
                )
            })
        });
        self
    }

    /// Store `value` under `key`, then mirror it to every setter
    ///
    /// # Errors
    /// Returns the session's sticky error, the store's write error, or
    /// [`CacheError::Collaborators`] when setters fail. Setter failures never
    /// undo the local write.
    pub fn upsert(self, key: &str, value: V, setters: &[Setter<'_, V>]) -> CacheResult<()> {
        let collection = self.state?;
        if setters.is_empty() {
            return collection.upsert(key, value);
        }
        collection.upsert(key, value.clone())?;
        notify(&collection, key, Some(&value), setters)
    }

    /// Store every pair, returning how many were written
    ///
    /// # Errors
    /// Returns the session's sticky error.
    pub fn upserts<I, K>(self, pairs: I) -> CacheResult<usize>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        Ok(self.state?.upsert_many(pairs))
    }

    /// Remove `key`, then tell every setter (with no value)
    ///
    /// # Errors
    /// Returns the session's sticky error,
    /// [`CacheError::StoreRemoveFailed`] if the key is absent, or
    /// [`CacheError::Collaborators`] when setters fail.
    pub fn delete(self, key: &str, setters: &[Setter<'_, V>]) -> CacheResult<()> {
        let collection = self.state?;
        collection.delete(key)?;
        notify(&collection, key, None, setters)
    }

    /// Finish the session and return the pending result as stored
    ///
    /// # Errors
    /// Returns the sticky error, or [`CacheError::NoResult`] on a miss.
    pub fn outcome(self) -> CacheResult<Outcome<V>> {
        let collection = self.state?;
        self.pending.ok_or_else(|| CacheError::NoResult { collection: collection.name().to_string() })
    }

    /// Finish the session and decode the pending result into `T`
    ///
    /// The result crosses a serde_json boundary, so any structurally
    /// compatible `T` works (for example a stored JSON array read back as
    /// `Vec<u32>`).
    ///
    /// # Errors
    /// Returns the sticky error, [`CacheError::NoResult`] on a miss, or
    /// [`CacheError::Decode`] if the result does not fit `T`.
    pub fn exec<T>(self) -> CacheResult<T>
    where
        T: DeserializeOwned,
        V: Serialize,
        V::Item: Serialize,
    {
        let outcome = self.outcome()?;
        let json = outcome.to_json()?;
        Ok(serde_json::from_value(json)?)
    }
}

impl<V, C> fmt::Debug for Session<V, C>
where
    V: CacheValue,
    C: Clock,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("Session");
        match &self.state {
            Ok(collection) => debug.field("collection", &collection.name()),
            Err(err) => debug.field("error", err),
        };
        debug.field("hit", &self.is_hit()).finish()
    }
}

/// Live value from the collection, else from the first fallback whose value
/// could be stored
fn resolve<V, C>(collection: &Collection<V, C>, key: &str, fallbacks: &[Getter<'_, V>]) -> Option<V>
where
    V: CacheValue,
    C: Clock,
{
    if let Some(value) = collection.get(key) {
        return Some(value);
    }
    if fallbacks.is_empty() {
        debug!(collection = %collection.name(), key, "cache miss");
        return None;
    }

    let composite = collection.composite_key(key);
    for (index, fallback) in fallbacks.iter().enumerate() {
        match fallback(&composite) {
            Ok(Some(value)) => match collection.upsert(key, value.clone()) {
                Ok(()) => {
                    collection.record_refill();
                    debug!(key = %composite, fallback = index, "refilled from fallback");
                    return Some(value);
                }
                Err(err) => {
                    warn!(
                        key = %composite,
                        fallback = index,
                        error = %err,
                        "failed to store fallback value, trying next"
                    );
                }
            },
            Ok(None) => {
                debug!(key = %composite, fallback = index, "fallback has no value");
                return None;
            }
            Err(err) => {
                debug!(key = %composite, fallback = index, error = %err, "fallback failed");
            }
        }
    }

    debug!(key = %composite, attempts = fallbacks.len(), "every fallback failed");
    None
}

/// Run every setter, collecting all failures
fn notify<V, C>(
    collection: &Collection<V, C>,
    key: &str,
    value: Option<&V>,
    setters: &[Setter<'_, V>],
) -> CacheResult<()>
where
    V: CacheValue,
    C: Clock,
{
    if setters.is_empty() {
        return Ok(());
    }

    let composite = collection.composite_key(key);
    let errors: Vec<SourceError> = setters
        .iter()
        .enumerate()
        .filter_map(|(index, setter)| match setter(&composite, value) {
            Ok(()) => None,
            Err(err) => {
                warn!(key = %composite, setter = index, error = %err, "fallback setter failed");
                Some(err)
            }
        })
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(CollaboratorErrors::new(composite, errors).into())
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::time::Duration;

    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::config::CollectionConfig;

    fn session() -> (Session, Arc<Collection<Value>>) {
        let config = CollectionConfig::builder("col1").capacity(10).build();
        let collection = Arc::new(Collection::new(config).unwrap());
        (Session::bound(Arc::clone(&collection)), collection)
    }

    fn fresh(collection: &Arc<Collection<Value>>) -> Session {
        Session::bound(Arc::clone(collection))
    }

    #[test]
    fn test_get_hit_without_fallbacks() {
        let (session, col) = session();
        col.upsert("k", json!("v")).unwrap();

        let value: String = session.get("k", None, &[]).exec().unwrap();
        assert_eq!(value, "v");
    }

    #[test]
    fn test_get_miss_is_no_result() {
        let (session, _) = session();
        let err = session.get("k", None, &[]).exec::<Value>().unwrap_err();
        assert!(err.is_miss());
    }

    #[test]
    fn test_fallbacks_tried_in_order_until_first_success() {
        let (session, col) = session();
        let calls = RefCell::new(Vec::new());
        let f1 = |key: &str| -> Result<Option<Value>, SourceError> {
            calls.borrow_mut().push(("f1", key.to_string()));
            Err("not here".into())
        };
        let f2 = |key: &str| -> Result<Option<Value>, SourceError> {
            calls.borrow_mut().push(("f2", key.to_string()));
            Ok(Some(json!(7)))
        };
        let f3 = |_: &str| -> Result<Option<Value>, SourceError> {
            calls.borrow_mut().push(("f3", String::new()));
            Ok(Some(json!(8)))
        };

        let value: i64 = session.get("missingKey", None, &[&f1, &f2, &f3]).exec().unwrap();

        assert_eq!(value, 7);
        assert_eq!(
            *calls.borrow(),
            vec![("f1", "col1.missingKey".to_string()), ("f2", "col1.missingKey".to_string())]
        );
        assert_eq!(col.get("missingKey"), Some(json!(7)));
        assert_eq!(col.stats().refills, 1);
    }

    /// Validates `Session::get` behavior when a fetched value cannot be stored:
    /// the next fallback is tried and the read ends as a miss.
    #[test]
    fn test_unstorable_fallback_value_tries_next_fallback() {
        let (session, col) = session();
        let second_called = Cell::new(false);
        let f1 = |_: &str| -> Result<Option<Value>, SourceError> { Ok(Some(json!(7))) };
        let f2 = |key: &str| -> Result<Option<Value>, SourceError> {
            assert_eq!(key, "col1.");
            second_called.set(true);
            Ok(Some(json!(8)))
        };

        let result = session.get("", None, &[&f1, &f2]).exec::<i64>();

        assert!(matches!(result, Err(ref err) if err.is_miss()));
        assert!(second_called.get());
        assert!(col.is_empty());
        assert_eq!(col.stats().refills, 0);
    }

    #[test]
    fn test_fallback_absent_value_ends_chain() {
        let (session, col) = session();
        let next_called = Cell::new(false);
        let empty = |_: &str| -> Result<Option<Value>, SourceError> { Ok(None) };
        let next = |_: &str| -> Result<Option<Value>, SourceError> {
            next_called.set(true);
            Ok(Some(json!(1)))
        };

        let session = session.get("k", None, &[&empty, &next]);

        assert!(!session.is_hit());
        assert!(!next_called.get());
        assert!(col.is_empty());
    }

    #[test]
    fn test_predicate_get_returns_first_match() {
        let (session, col) = session();
        col.upsert("seq", json!([1, 2, 3, 3, 4])).unwrap();
        let seen = RefCell::new(Vec::new());
        let is_three = |v: &Value, index: usize| {
            seen.borrow_mut().push(index);
            v == &json!(3)
        };

        let outcome = session.get("seq", Some(&is_three), &[]).outcome().unwrap();

        assert_eq!(outcome, Outcome::Element(json!(3)));
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn test_predicate_on_scalar_or_without_match_is_miss() {
        let (_, col) = session();
        col.upsert("scalar", json!("text")).unwrap();
        col.upsert("seq", json!([1, 2])).unwrap();
        let never = |_: &Value, _: usize| false;
        let always = |_: &Value, _: usize| true;

        assert!(!fresh(&col).get("scalar", Some(&always), &[]).is_hit());
        assert!(!fresh(&col).get("seq", Some(&never), &[]).is_hit());
        assert!(!fresh(&col).filter("scalar", Some(&always), &[]).is_hit());
    }

    #[test]
    fn test_filter_preserves_order() {
        let (session, col) = session();
        col.upsert("seq", json!([1, 2, 3, 4])).unwrap();
        let at_least_two = |v: &Value, _: usize| v.as_i64().is_some_and(|n| n >= 2);

        let values: Vec<u32> = session.filter("seq", Some(&at_least_two), &[]).exec().unwrap();
        assert_eq!(values, vec![2, 3, 4]);
    }

    #[test]
    fn test_filter_without_match_is_empty_hit() {
        let (session, col) = session();
        col.upsert("seq", json!([1, 2])).unwrap();
        let never = |_: &Value, _: usize| false;

        let values: Vec<i64> = session.filter("seq", Some(&never), &[]).exec().unwrap();
        assert!(values.is_empty());
    }

    #[test]
    fn test_filter_without_predicate_is_plain_get() {
        let (session, col) = session();
        col.upsert("seq", json!([5, 6])).unwrap();

        let outcome = session.filter("seq", None, &[]).outcome().unwrap();
        assert_eq!(outcome, Outcome::Value(json!([5, 6])));
    }

    #[test]
    fn test_later_miss_clears_earlier_result() {
        let (session, col) = session();
        col.upsert("a", json!(1)).unwrap();

        let session = session.get("a", None, &[]).get("b", None, &[]);
        assert!(!session.is_hit());
    }

    #[test]
    fn test_sticky_error_skips_every_step() {
        let called = Cell::new(false);
        let fallback = |_: &str| -> Result<Option<Value>, SourceError> {
            called.set(true);
            Ok(Some(json!(1)))
        };
        let session: Session =
            Session::failed(CacheError::CollectionNotFound { name: "nope".into() });

        let session = session.get("k", None, &[&fallback]).filter("k", None, &[&fallback]);
        assert!(session.composite_key("k").is_none());
        let err = session.exec::<Value>().unwrap_err();

        assert!(matches!(err, CacheError::CollectionNotFound { .. }));
        assert!(!called.get());
    }

    #[test]
    fn test_write_operations_return_sticky_error() {
        let failed = || -> Session { Session::failed(CacheError::CollectionNotFound { name: "x".into() }) };

        assert!(matches!(failed().upsert("k", json!(1), &[]), Err(CacheError::CollectionNotFound { .. })));
        assert!(matches!(failed().upserts([("k", json!(1))]), Err(CacheError::CollectionNotFound { .. })));
        assert!(matches!(failed().delete("k", &[]), Err(CacheError::CollectionNotFound { .. })));
    }

    #[test]
    fn test_upsert_aggregates_setter_errors_after_local_write() {
        let (session, col) = session();
        let ok_calls = RefCell::new(Vec::new());
        let ok = |key: &str, value: Option<&Value>| -> Result<(), SourceError> {
            ok_calls.borrow_mut().push((key.to_string(), value.cloned()));
            Ok(())
        };
        let down = |_: &str, _: Option<&Value>| -> Result<(), SourceError> { Err("redis down".into()) };
        let full = |_: &str, _: Option<&Value>| -> Result<(), SourceError> { Err("queue full".into()) };

        let err = session.upsert("k", json!(5), &[&down, &ok, &full]).unwrap_err();

        let errors = match err {
            CacheError::Collaborators(errors) => errors,
            other => panic!("expected collaborator errors, got {other:?}"),
        };
        assert_eq!(errors.len(), 2);
        assert_eq!(errors.key(), "col1.k");
        assert_eq!(*ok_calls.borrow(), vec![("col1.k".to_string(), Some(json!(5)))]);
        assert_eq!(col.get("k"), Some(json!(5)));
    }

    #[test]
    fn test_upsert_rejects_empty_key_before_setters() {
        let (session, _) = session();
        let called = Cell::new(false);
        let setter = |_: &str, _: Option<&Value>| -> Result<(), SourceError> {
            called.set(true);
            Ok(())
        };

        let err = session.upsert("", json!(1), &[&setter]).unwrap_err();
        assert!(matches!(err, CacheError::StoreWriteFailed { .. }));
        assert!(!called.get());
    }

    #[test]
    fn test_delete_propagates_absence_to_setters() {
        let (session, col) = session();
        col.upsert("k", json!(5)).unwrap();
        let seen = RefCell::new(None);
        let setter = |key: &str, value: Option<&Value>| -> Result<(), SourceError> {
            *seen.borrow_mut() = Some((key.to_string(), value.is_none()));
            Ok(())
        };

        session.delete("k", &[&setter]).unwrap();

        assert_eq!(*seen.borrow(), Some(("col1.k".to_string(), true)));
        assert!(fresh(&col).get("k", None, &[]).outcome().is_err());
        assert!(matches!(
            fresh(&col).delete("k", &[&setter]),
            Err(CacheError::StoreRemoveFailed { .. })
        ));
    }

    #[test]
    fn test_upserts_counts_written_pairs() {
        let (session, col) = session();
        let written = session.upserts([("a", json!(1)), ("b", json!(2)), ("", json!(3))]).unwrap();
        assert_eq!(written, 2);
        assert_eq!(col.len(), 2);
    }

    #[test]
    fn test_exec_decodes_struct_and_reports_shape_mismatch() {
        #[derive(Debug, Deserialize, PartialEq)]
        struct Point {
            x1: i32,
            x2: i32,
        }

        let (session, col) = session();
        col.upsert("p", json!({ "x1": 1, "x2": 2 })).unwrap();

        let point: Point = session.get("p", None, &[]).exec().unwrap();
        assert_eq!(point, Point { x1: 1, x2: 2 });

        let err = fresh(&col).get("p", None, &[]).exec::<Vec<i32>>().unwrap_err();
        assert!(matches!(err, CacheError::Decode(_)));
    }

    #[test]
    fn test_typed_collection_outcome() {
        let config = CollectionConfig::builder("lists").ttl(Duration::from_secs(60)).build();
        let col: Arc<Collection<Vec<String>>> = Arc::new(Collection::new(config).unwrap());
        col.upsert("names", vec!["ada".to_string(), "alan".to_string(), "grace".to_string()])
            .unwrap();
        let starts_with_a = |name: &String, _: usize| name.starts_with('a');

        let outcome = Session::bound(Arc::clone(&col))
            .filter("names", Some(&starts_with_a), &[])
            .outcome()
            .unwrap();

        assert_eq!(outcome, Outcome::Elements(vec!["ada".to_string(), "alan".to_string()]));
    }
}
