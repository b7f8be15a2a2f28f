//! Inventory service.
//!
//! Owns the coffee collection and its id counter in one state cell. Every
//! operation takes the cell's write guard once and finishes its read and
//! write before releasing it, with no `.await` in between, so concurrent
//! calls cannot interleave inside a check-then-write.

use tokio::sync::RwLock;

use crate::domain::coffee::{
    initial_coffees, suggest_available_name, Coffee, CoffeeAlreadyExists, CoffeeDetails,
    CoffeeFilter, CoffeeNotFound,
};
use crate::domain::foundation::{CoffeeId, IdSequence};

struct InventoryState {
    coffees: Vec<Coffee>,
    ids: IdSequence,
}

/// In-memory coffee inventory with case-insensitive name uniqueness.
pub struct InventoryService {
    state: RwLock<InventoryState>,
}

impl Default for InventoryService {
    fn default() -> Self {
        Self::seeded()
    }
}

impl InventoryService {
    /// Creates a service holding `coffees`. New ids continue after the
    /// largest id present.
    pub fn new(coffees: Vec<Coffee>) -> Self {
        let ids = IdSequence::after(coffees.iter().map(|c| c.id.value()));
        Self {
            state: RwLock::new(InventoryState { coffees, ids }),
        }
    }

    /// Creates a service holding the standard seed inventory.
    pub fn seeded() -> Self {
        Self::new(initial_coffees())
    }

    /// Returns the records matching `filter`, in insertion order.
    pub async fn list(&self, filter: &CoffeeFilter) -> Vec<Coffee> {
        let state = self.state.read().await;
        state
            .coffees
            .iter()
            .filter(|c| filter.matches(c))
            .cloned()
            .collect()
    }

    /// Adds a coffee unless its name is already taken (ignoring case).
    pub async fn create(&self, details: CoffeeDetails) -> Result<Coffee, CoffeeAlreadyExists> {
        let mut state = self.state.write().await;

        if state
            .coffees
            .iter()
            .any(|c| CoffeeFilter::same_name(c, &details.name))
        {
            let suggestion =
                suggest_available_name(&details.name, state.coffees.iter().map(|c| c.name.as_str()));
            tracing::info!(
                coffee.name = %details.name,
                suggestion = %suggestion,
                "rejected duplicate coffee name"
            );
            return Err(CoffeeAlreadyExists {
                name: details.name,
                suggestion,
            });
        }

        let id = CoffeeId::new(state.ids.allocate());
        let coffee = Coffee::from_details(id, details);
        state.coffees.push(coffee.clone());

        tracing::info!(coffee.id = %id, coffee.name = %coffee.name, "coffee created");
        Ok(coffee)
    }

    /// Replaces every mutable field of the record with `id`.
    ///
    /// The new name is not checked against other records.
    pub async fn update(&self, id: CoffeeId, details: CoffeeDetails) -> Result<Coffee, CoffeeNotFound> {
        let mut state = self.state.write().await;

        let duplicates = state
            .coffees
            .iter()
            .any(|c| c.id != id && CoffeeFilter::same_name(c, &details.name));

        let slot = state
            .coffees
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CoffeeNotFound { id })?;
        *slot = Coffee::from_details(id, details);
        let updated = slot.clone();

        if duplicates {
            tracing::warn!(
                coffee.id = %id,
                coffee.name = %updated.name,
                "update left two coffees with the same name"
            );
        }
        tracing::info!(coffee.id = %id, coffee.name = %updated.name, "coffee updated");
        Ok(updated)
    }

    /// Removes the record with `id`. Its id is never handed out again.
    pub async fn delete(&self, id: CoffeeId) -> Result<(), CoffeeNotFound> {
        let mut state = self.state.write().await;

        let index = state
            .coffees
            .iter()
            .position(|c| c.id == id)
            .ok_or(CoffeeNotFound { id })?;
        let removed = state.coffees.remove(index);

        tracing::info!(coffee.id = %id, coffee.name = %removed.name, "coffee deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coffee::names_match;
    use std::sync::Arc;

    fn details(name: &str) -> CoffeeDetails {
        CoffeeDetails {
            name: name.to_string(),
            origin: "X".to_string(),
            roast: "Medium".to_string(),
            price: 1.0,
            weight: "1oz".to_string(),
            description: "d".to_string(),
            in_stock: true,
        }
    }

    async fn count(service: &InventoryService) -> usize {
        service.list(&CoffeeFilter::all()).await.len()
    }

    mod create {
        use super::*;

        #[tokio::test]
        async fn duplicate_seed_name_fails_with_suggestion_and_leaves_list_unchanged() {
            let service = InventoryService::seeded();

            let err = service.create(details("Ethiopian Yirgacheffe")).await.unwrap_err();

            assert_eq!(
                err,
                CoffeeAlreadyExists {
                    name: "Ethiopian Yirgacheffe".to_string(),
                    suggestion: "Ethiopian Yirgacheffe 2".to_string(),
                }
            );
            assert_eq!(count(&service).await, 6);
        }

        #[tokio::test]
        async fn duplicate_check_ignores_case() {
            let service = InventoryService::seeded();

            let err = service.create(details("hawaiian KONA")).await.unwrap_err();

            assert_eq!(err.name, "hawaiian KONA");
            assert_eq!(err.suggestion, "hawaiian KONA 2");
        }

        #[tokio::test]
        async fn suggestions_walk_past_taken_suffixes() {
            let service = InventoryService::new(Vec::new());
            service.create(details("X")).await.unwrap();

            let first = service.create(details("X")).await.unwrap_err();
            assert_eq!(first.suggestion, "X 2");

            service.create(details("X 2")).await.unwrap();
            let second = service.create(details("X")).await.unwrap_err();
            assert_eq!(second.suggestion, "X 3");

            service.create(details("x 3")).await.unwrap();
            let third = service.create(details("X")).await.unwrap_err();
            assert_eq!(third.suggestion, "X 4");
        }

        #[tokio::test]
        async fn new_ids_continue_after_seed() {
            let service = InventoryService::seeded();

            let created = service.create(details("Kenya AA")).await.unwrap();

            assert_eq!(created.id, CoffeeId::new(7));
            assert_eq!(count(&service).await, 7);
        }

        #[tokio::test]
        async fn ids_are_never_reused_after_delete() {
            let service = InventoryService::seeded();
            let first = service.create(details("Kenya AA")).await.unwrap();
            service.delete(first.id).await.unwrap();

            let second = service.create(details("Kenya AA")).await.unwrap();

            assert_eq!(first.id, CoffeeId::new(7));
            assert_eq!(second.id, CoffeeId::new(8));
        }

        #[tokio::test]
        async fn concurrent_creates_with_same_name_admit_exactly_one() {
            let service = Arc::new(InventoryService::new(Vec::new()));

            let handles: Vec<_> = (0..32)
                .map(|i| {
                    let service = Arc::clone(&service);
                    let name = if i % 2 == 0 { "Same Name" } else { "SAME NAME" };
                    tokio::spawn(async move { service.create(details(name)).await })
                })
                .collect();

            let mut created = 0;
            for handle in handles {
                if handle.await.unwrap().is_ok() {
                    created += 1;
                }
            }

            assert_eq!(created, 1);
            assert_eq!(count(&service).await, 1);
        }
    }

    mod list {
        use super::*;

        #[tokio::test]
        async fn no_filter_returns_seed_in_order() {
            let service = InventoryService::seeded();

            let names: Vec<String> = service
                .list(&CoffeeFilter::all())
                .await
                .into_iter()
                .map(|c| c.name)
                .collect();

            assert_eq!(names.first().map(String::as_str), Some("Ethiopian Yirgacheffe"));
            assert_eq!(names.last().map(String::as_str), Some("Sumatra Mandheling"));
            assert_eq!(names.len(), 6);
        }

        #[tokio::test]
        async fn name_filter_is_case_insensitive_substring() {
            let service = InventoryService::seeded();

            let found = service.list(&CoffeeFilter::all().with_name("AN")).await;
            let names: Vec<&str> = found.iter().map(|c| c.name.as_str()).collect();

            assert_eq!(
                names,
                vec![
                    "Ethiopian Yirgacheffe",
                    "Colombian Supremo",
                    "Guatemala Antigua",
                    "Jamaican Blue Mountain",
                    "Hawaiian Kona",
                    "Sumatra Mandheling",
                ]
            );
        }

        #[tokio::test]
        async fn id_and_name_filters_combine() {
            let service = InventoryService::seeded();

            let hit = service
                .list(&CoffeeFilter::all().with_id(CoffeeId::new(5)).with_name("kona"))
                .await;
            assert_eq!(hit.len(), 1);
            assert_eq!(hit[0].name, "Hawaiian Kona");

            let miss = service
                .list(&CoffeeFilter::all().with_id(CoffeeId::new(4)).with_name("kona"))
                .await;
            assert!(miss.is_empty());
        }

        #[tokio::test]
        async fn unmatched_filter_returns_empty() {
            let service = InventoryService::seeded();
            assert!(service.list(&CoffeeFilter::all().with_name("decaf")).await.is_empty());
            assert!(service.list(&CoffeeFilter::all().with_id(CoffeeId::new(99))).await.is_empty());
        }
    }

    mod update {
        use super::*;

        #[tokio::test]
        async fn replaces_all_fields() {
            let service = InventoryService::seeded();
            let replacement = CoffeeDetails {
                name: "Kona Reserve".to_string(),
                origin: "Big Island".to_string(),
                roast: "Light".to_string(),
                price: 60.0,
                weight: "6oz".to_string(),
                description: "New lot".to_string(),
                in_stock: false,
            };

            let updated = service.update(CoffeeId::new(5), replacement.clone()).await.unwrap();

            assert_eq!(updated, Coffee::from_details(CoffeeId::new(5), replacement));
            let listed = service.list(&CoffeeFilter::all().with_id(CoffeeId::new(5))).await;
            assert_eq!(listed, vec![updated]);
        }

        #[tokio::test]
        async fn unknown_id_fails_without_mutation() {
            let service = InventoryService::seeded();
            let before = service.list(&CoffeeFilter::all()).await;

            let err = service.update(CoffeeId::new(99), details("Ghost")).await.unwrap_err();

            assert_eq!(err, CoffeeNotFound { id: CoffeeId::new(99) });
            assert_eq!(service.list(&CoffeeFilter::all()).await, before);
        }

        #[tokio::test]
        async fn does_not_recheck_name_uniqueness() {
            let service = InventoryService::seeded();

            let updated = service
                .update(CoffeeId::new(2), details("Hawaiian Kona"))
                .await
                .unwrap();

            assert_eq!(updated.name, "Hawaiian Kona");
            assert_eq!(service.list(&CoffeeFilter::all().with_name("hawaiian kona")).await.len(), 2);
        }
    }

    mod delete {
        use super::*;

        #[tokio::test]
        async fn create_then_delete_returns_to_baseline() {
            let service = InventoryService::seeded();
            let baseline = count(&service).await;

            let created = service.create(details("Kenya AA")).await.unwrap();
            assert_eq!(count(&service).await, baseline + 1);

            service.delete(created.id).await.unwrap();
            assert_eq!(count(&service).await, baseline);
            assert!(service.list(&CoffeeFilter::all().with_id(created.id)).await.is_empty());
        }

        #[tokio::test]
        async fn unknown_id_fails_without_mutation() {
            let service = InventoryService::seeded();

            let err = service.delete(CoffeeId::new(42)).await.unwrap_err();

            assert_eq!(err, CoffeeNotFound { id: CoffeeId::new(42) });
            assert_eq!(count(&service).await, 6);
        }

        #[tokio::test]
        async fn second_delete_of_same_id_fails() {
            let service = InventoryService::seeded();
            service.delete(CoffeeId::new(1)).await.unwrap();

            let err = service.delete(CoffeeId::new(1)).await.unwrap_err();
            assert_eq!(err.id, CoffeeId::new(1));
        }
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn name_strategy() -> impl Strategy<Value = String> {
            prop_oneof![
                Just("Kona".to_string()),
                Just("KONA".to_string()),
                Just("kona 2".to_string()),
                Just("Kona 3".to_string()),
                "[a-cA-C]{1,3}( [2-4])?".prop_map(|s| s),
            ]
        }

        proptest! {
            /// No sequence of creates leaves two live records whose names match ignoring case.
            #[test]
            fn creates_never_produce_case_insensitive_duplicates(
                names in prop::collection::vec(name_strategy(), 1..40)
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                let coffees = runtime.block_on(async {
                    let service = InventoryService::seeded();
                    for name in &names {
                        let _ = service.create(details(name)).await;
                    }
                    service.list(&CoffeeFilter::all()).await
                });

                for (i, a) in coffees.iter().enumerate() {
                    for b in coffees.iter().skip(i + 1) {
                        prop_assert!(!names_match(&a.name, &b.name), "{} vs {}", a.name, b.name);
                    }
                }
            }

            /// A rejected create's suggestion is always free at the time it is returned.
            #[test]
            fn suggestions_are_always_free(
                names in prop::collection::vec(name_strategy(), 1..40)
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
                runtime.block_on(async {
                    let service = InventoryService::new(Vec::new());
                    for name in &names {
                        if let Err(err) = service.create(details(name)).await {
                            let taken = service
                                .list(&CoffeeFilter::all())
                                .await
                                .iter()
                                .any(|c| names_match(&c.name, &err.suggestion));
                            assert!(!taken, "suggestion {} already taken", err.suggestion);
                        }
                    }
                });
            }
        }
    }
}
