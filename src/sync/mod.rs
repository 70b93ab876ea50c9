use std::sync::{Arc, RwLock};

use futures::future;

use crate::api::models::{NewPrescription, Prescription, PrescriptionPatch};
use crate::api::{ApiClient, ApiError, PrescriptionApi};

pub type SharedRxList = Arc<RxList<ApiClient>>;

/// Owns the client's view of the prescription list.
///
/// The list is held as an `Arc` snapshot. Renderers borrow the current
/// snapshot and keep it for as long as they need; mutations never touch a
/// snapshot that has already been handed out. Every operation talks to the
/// backend first and only then derives a new snapshot from the list as it
/// stands at that moment, so a failed call leaves the list exactly as it was.
pub struct RxList<A> {
    api: A,
    records: RwLock<Arc<Vec<Prescription>>>,
}

impl<A: PrescriptionApi> RxList<A> {
    pub fn new(api: A) -> Self {
        RxList {
            api,
            records: RwLock::new(Arc::new(Vec::new())),
        }
    }

    /// The current snapshot.
    pub fn snapshot(&self) -> Arc<Vec<Prescription>> {
        self.records.read().unwrap().clone()
    }

    /// Re-derives the whole list from the backend.
    ///
    /// Two phases: fetch the name listing, then fetch every record
    /// concurrently and join. The join is all-or-nothing; if any single
    /// fetch fails, the first failure aborts the batch and the previous
    /// snapshot stays in place. On success the list is replaced wholesale,
    /// in the order the backend listed the names. This is the only
    /// operation that can grow, shrink, or reorder the list in bulk.
    pub async fn refresh(&self) -> Result<Arc<Vec<Prescription>>, ApiError> {
        let names = self.api.list_names().await?;
        let records =
            future::try_join_all(names.iter().map(|name| self.api.fetch(name))).await?;
        let fresh = Arc::new(records);
        *self.records.write().unwrap() = Arc::clone(&fresh);
        Ok(fresh)
    }

    /// Creates a prescription from raw form input and appends the record the
    /// backend returns to the tail of the list.
    pub async fn create(
        &self,
        name: &str,
        quantity_raw: &str,
        rate_raw: &str,
    ) -> Result<Prescription, ApiError> {
        let body = NewPrescription::parse(quantity_raw, rate_raw)?;
        let created = self.api.create(name, &body).await?;
        self.commit(|current| with_appended(current, created.clone()));
        Ok(created)
    }

    /// Applies a partial update built from whichever inputs are non-empty.
    ///
    /// Both inputs empty is a no-op: no request is issued and `None` is
    /// returned. Otherwise the record the backend returns replaces the
    /// matching entry in place; every other entry and the overall order
    /// pass through unchanged.
    pub async fn update(
        &self,
        name: &str,
        quantity_raw: &str,
        rate_raw: &str,
    ) -> Result<Option<Prescription>, ApiError> {
        let patch = PrescriptionPatch::parse(quantity_raw, rate_raw)?;
        if patch.is_empty() {
            return Ok(None);
        }
        let updated = self.api.update(name, &patch).await?;
        self.commit(|current| with_replaced_by_name(current, updated.clone()));
        Ok(Some(updated))
    }

    /// Deletes a prescription and drops the matching record from the list,
    /// keeping the relative order of everything else.
    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.api.delete(name).await?;
        self.commit(|current| without_name(current, name));
        Ok(())
    }

    /// Swaps in a new snapshot derived from the list as it stands once the
    /// backend call has settled, not as it stood when the operation began.
    /// Overlapping mutations are not otherwise coordinated; the last one to
    /// settle wins.
    fn commit(&self, transform: impl FnOnce(&[Prescription]) -> Vec<Prescription>) {
        let mut records = self.records.write().unwrap();
        *records = Arc::new(transform(&records));
    }
}

/// A copy of `records` with `record` appended at the tail.
pub fn with_appended(records: &[Prescription], record: Prescription) -> Vec<Prescription> {
    let mut next = records.to_vec();
    next.push(record);
    next
}

/// A copy of `records` with the entry whose name matches `replacement`
/// swapped out for it. Order is preserved; a replacement with no matching
/// entry leaves the copy identical.
pub fn with_replaced_by_name(
    records: &[Prescription],
    replacement: Prescription,
) -> Vec<Prescription> {
    records
        .iter()
        .map(|record| {
            if record.name == replacement.name {
                replacement.clone()
            } else {
                record.clone()
            }
        })
        .collect()
}

/// A copy of `records` without the entry named `name`.
pub fn without_name(records: &[Prescription], name: &str) -> Vec<Prescription> {
    records
        .iter()
        .filter(|record| record.name != name)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use reqwest::StatusCode;

    use super::*;

    /// In-memory stand-in for the backend. Keeps records in listing order,
    /// counts requests, and can be told to reject everything or to fail the
    /// detail fetch for one specific name.
    struct FakeApi {
        store: Mutex<Vec<Prescription>>,
        fail_fetch_of: Mutex<Option<String>>,
        reject_writes: Mutex<bool>,
        requests: AtomicUsize,
    }

    impl FakeApi {
        fn with_records(records: Vec<Prescription>) -> Self {
            FakeApi {
                store: Mutex::new(records),
                fail_fetch_of: Mutex::new(None),
                reject_writes: Mutex::new(false),
                requests: AtomicUsize::new(0),
            }
        }

        fn fail_fetch_of(&self, name: &str) {
            *self.fail_fetch_of.lock().unwrap() = Some(name.to_string());
        }

        fn reject_writes(&self) {
            *self.reject_writes.lock().unwrap() = true;
        }

        fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        fn rejecting(&self) -> Result<(), ApiError> {
            if *self.reject_writes.lock().unwrap() {
                Err(ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PrescriptionApi for FakeApi {
        async fn list_names(&self) -> Result<Vec<String>, ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .store
                .lock()
                .unwrap()
                .iter()
                .map(|record| record.name.clone())
                .collect())
        }

        async fn fetch(&self, name: &str) -> Result<Prescription, ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            if self.fail_fetch_of.lock().unwrap().as_deref() == Some(name) {
                return Err(ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR));
            }
            self.store
                .lock()
                .unwrap()
                .iter()
                .find(|record| record.name == name)
                .cloned()
                .ok_or(ApiError::Rejected(StatusCode::NOT_FOUND))
        }

        async fn create(
            &self,
            name: &str,
            body: &NewPrescription,
        ) -> Result<Prescription, ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.rejecting()?;
            let mut store = self.store.lock().unwrap();
            if store.iter().any(|record| record.name == name) {
                return Err(ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR));
            }
            let record = Prescription {
                name: name.to_string(),
                count: body.quantity,
                refill: "2024-02-01T00:00:00Z".to_string(),
                rate: body.rate,
                quantity: body.quantity,
                updated: "2024-01-01T00:00:00Z".to_string(),
            };
            store.push(record.clone());
            Ok(record)
        }

        async fn update(
            &self,
            name: &str,
            body: &PrescriptionPatch,
        ) -> Result<Prescription, ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.rejecting()?;
            let mut store = self.store.lock().unwrap();
            let record = store
                .iter_mut()
                .find(|record| record.name == name)
                .ok_or(ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR))?;
            if let Some(quantity) = body.quantity {
                record.quantity = quantity;
            }
            if let Some(rate) = body.rate {
                record.rate = rate;
            }
            record.updated = "2024-01-02T00:00:00Z".to_string();
            Ok(record.clone())
        }

        async fn delete(&self, name: &str) -> Result<(), ApiError> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            self.rejecting()?;
            let mut store = self.store.lock().unwrap();
            let before = store.len();
            store.retain(|record| record.name != name);
            if store.len() == before {
                return Err(ApiError::Rejected(StatusCode::INTERNAL_SERVER_ERROR));
            }
            Ok(())
        }
    }

    fn record(name: &str) -> Prescription {
        Prescription {
            name: name.to_string(),
            count: 5.0,
            refill: "2024-01-01T00:00:00Z".to_string(),
            rate: 1.0,
            quantity: 30.0,
            updated: "2023-12-01T00:00:00Z".to_string(),
        }
    }

    fn names(records: &[Prescription]) -> Vec<&str> {
        records.iter().map(|record| record.name.as_str()).collect()
    }

    #[tokio::test]
    async fn refresh_materializes_the_backend_listing_in_order() {
        let list = RxList::new(FakeApi::with_records(vec![record("A"), record("B")]));

        let records = list.refresh().await.unwrap();

        assert_eq!(names(&records), ["A", "B"]);
        assert_eq!(records[0], record("A"));
        assert_eq!(records[1], record("B"));
        assert_eq!(*list.snapshot(), *records);
    }

    #[tokio::test]
    async fn refresh_aborts_wholesale_when_one_fetch_fails() {
        let api = FakeApi::with_records(vec![record("A"), record("B")]);
        let list = RxList::new(api);
        list.refresh().await.unwrap();
        let before = list.snapshot();

        list.api.fail_fetch_of("B");
        assert!(list.refresh().await.is_err());

        assert_eq!(*list.snapshot(), *before);
    }

    #[tokio::test]
    async fn create_appends_the_returned_record_at_the_tail() {
        let list = RxList::new(FakeApi::with_records(vec![record("A")]));
        list.refresh().await.unwrap();

        let created = list.create("C", "30", "1").await.unwrap();

        let snapshot = list.snapshot();
        assert_eq!(names(&snapshot), ["A", "C"]);
        assert_eq!(snapshot[1], created);
    }

    #[tokio::test]
    async fn rejected_create_leaves_the_list_untouched() {
        let list = RxList::new(FakeApi::with_records(vec![record("A")]));
        list.refresh().await.unwrap();
        let before = list.snapshot();

        list.api.reject_writes();
        assert!(list.create("C", "30", "1").await.is_err());

        assert_eq!(*list.snapshot(), *before);
    }

    #[tokio::test]
    async fn unparseable_create_input_never_reaches_the_network() {
        let list = RxList::new(FakeApi::with_records(Vec::new()));

        let result = list.create("C", "thirty", "1").await;

        assert!(matches!(result, Err(ApiError::Validation { .. })));
        assert_eq!(list.api.request_count(), 0);
    }

    #[tokio::test]
    async fn update_replaces_only_the_matching_record() {
        let list = RxList::new(FakeApi::with_records(vec![
            record("A"),
            record("B"),
            record("C"),
        ]));
        list.refresh().await.unwrap();

        let updated = list.update("B", "60", "").await.unwrap().unwrap();

        let snapshot = list.snapshot();
        assert_eq!(names(&snapshot), ["A", "B", "C"]);
        assert_eq!(snapshot[1], updated);
        assert_eq!(snapshot[1].quantity, 60.0);
        assert_eq!(snapshot[0], record("A"));
        assert_eq!(snapshot[2], record("C"));
    }

    #[tokio::test]
    async fn update_with_both_inputs_empty_is_a_network_free_no_op() {
        let list = RxList::new(FakeApi::with_records(vec![record("A")]));
        list.refresh().await.unwrap();
        let before = list.snapshot();
        let requests_before = list.api.request_count();

        let result = list.update("A", "", "").await.unwrap();

        assert!(result.is_none());
        assert_eq!(list.api.request_count(), requests_before);
        assert_eq!(*list.snapshot(), *before);
    }

    #[tokio::test]
    async fn rejected_update_leaves_the_list_untouched() {
        let list = RxList::new(FakeApi::with_records(vec![record("A")]));
        list.refresh().await.unwrap();
        let before = list.snapshot();

        list.api.reject_writes();
        assert!(list.update("A", "60", "").await.is_err());

        assert_eq!(*list.snapshot(), *before);
    }

    #[tokio::test]
    async fn delete_drops_only_the_matching_record() {
        let list = RxList::new(FakeApi::with_records(vec![record("A"), record("B")]));
        list.refresh().await.unwrap();

        list.delete("A").await.unwrap();

        assert_eq!(names(&list.snapshot()), ["B"]);
    }

    #[tokio::test]
    async fn rejected_delete_leaves_the_list_untouched() {
        let list = RxList::new(FakeApi::with_records(vec![record("A")]));
        list.refresh().await.unwrap();
        let before = list.snapshot();

        list.api.reject_writes();
        assert!(list.delete("A").await.is_err());

        assert_eq!(*list.snapshot(), *before);
    }

    #[tokio::test]
    async fn names_stay_unique_across_a_mutation_sequence() {
        let list = RxList::new(FakeApi::with_records(Vec::new()));
        list.refresh().await.unwrap();

        list.create("A", "30", "1").await.unwrap();
        assert!(list.create("A", "10", "2").await.is_err());
        list.create("B", "20", "1").await.unwrap();
        list.update("A", "", "2").await.unwrap();
        list.delete("B").await.unwrap();

        let snapshot = list.snapshot();
        assert_eq!(names(&snapshot), ["A"]);
    }

    #[tokio::test]
    async fn snapshots_handed_out_earlier_are_never_mutated() {
        let list = RxList::new(FakeApi::with_records(vec![record("A"), record("B")]));
        list.refresh().await.unwrap();
        let held = list.snapshot();

        list.delete("A").await.unwrap();
        list.create("C", "30", "1").await.unwrap();
        list.update("B", "99", "").await.unwrap();

        assert_eq!(names(&held), ["A", "B"]);
        assert_eq!(held[0], record("A"));
        assert_eq!(held[1], record("B"));
    }

    #[test]
    fn transforms_do_not_touch_their_input() {
        let original = vec![record("A"), record("B")];

        let appended = with_appended(&original, record("C"));
        let replaced = with_replaced_by_name(&original, {
            let mut changed = record("B");
            changed.quantity = 99.0;
            changed
        });
        let removed = without_name(&original, "A");

        assert_eq!(names(&original), ["A", "B"]);
        assert_eq!(names(&appended), ["A", "B", "C"]);
        assert_eq!(names(&replaced), ["A", "B"]);
        assert_eq!(replaced[1].quantity, 99.0);
        assert_eq!(names(&removed), ["B"]);
    }

    #[test]
    fn replacing_an_absent_name_changes_nothing() {
        let original = vec![record("A")];
        let replaced = with_replaced_by_name(&original, record("Z"));
        assert_eq!(replaced, original);
    }
}
