use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::{fs, sync::RwLock};

use crate::{
    balance::{compute_owed_amounts, Balance, SplitError},
    schemas::{BillState, Dish, PersonName, Selections},
};

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to serialize bill: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Split(#[from] SplitError),
}

/// Dishes, people and selections mirrored to a single JSON file.
///
/// Every mutation holds the write lock until the file has been replaced,
/// so concurrent writers are applied one at a time and the last one wins.
pub struct BillStore {
    path: PathBuf,
    state: RwLock<BillState>,
}

impl BillStore {
    /// Loads the state file, starting empty when it is missing or unreadable.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = read_state(&path);
        BillStore {
            path,
            state: RwLock::new(state),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn snapshot(&self) -> BillState {
        self.state.read().await.clone()
    }

    pub async fn dishes(&self) -> Vec<Dish> {
        self.state.read().await.dishes.clone()
    }

    pub async fn people(&self) -> Vec<PersonName> {
        self.state.read().await.people.clone()
    }

    pub async fn selections(&self) -> Selections {
        self.state.read().await.selections.clone()
    }

    pub async fn replace_dishes(&self, dishes: Vec<Dish>) -> Result<Vec<Dish>, StoreError> {
        let mut state = self.state.write().await;
        state.dishes = dishes;
        self.save(&state).await?;
        Ok(state.dishes.clone())
    }

    pub async fn replace_people(
        &self,
        people: Vec<PersonName>,
    ) -> Result<Vec<PersonName>, StoreError> {
        let mut state = self.state.write().await;
        state.people = people;
        self.save(&state).await?;
        Ok(state.people.clone())
    }

    pub async fn replace_selections(
        &self,
        selections: Selections,
    ) -> Result<Selections, StoreError> {
        let mut state = self.state.write().await;
        state.selections = selections;
        self.save(&state).await?;
        Ok(state.selections.clone())
    }

    /// Commits `selections`, then splits the current dishes among the current people.
    ///
    /// The selections stay committed even when a dish price turns out to be malformed.
    pub async fn calculate(&self, selections: Selections) -> Result<Balance, StoreError> {
        let mut state = self.state.write().await;
        state.selections = selections;
        self.save(&state).await?;
        let balance = compute_owed_amounts(&state.dishes, &state.people, &state.selections)?;
        Ok(balance)
    }

    pub async fn reset(&self) -> Result<(), StoreError> {
        let mut state = self.state.write().await;
        *state = BillState::default();
        self.save(&state).await
    }

    async fn save(&self, state: &BillState) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(state)?;

        if let Some(dir) = self.path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            fs::create_dir_all(dir).await.map_err(write_err(dir))?;
        }

        // Write to a sibling file and rename it over the old state
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, &bytes)
            .await
            .map_err(write_err(&temp_path))?;
        fs::rename(&temp_path, &self.path)
            .await
            .map_err(write_err(&self.path))?;

        log::debug!("Saved {} bytes to {}", bytes.len(), self.path.display());
        Ok(())
    }
}

fn write_err(path: &Path) -> impl FnOnce(io::Error) -> StoreError {
    let path = path.to_path_buf();
    move |source| StoreError::Write { path, source }
}

fn read_state(path: &Path) -> BillState {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            log::info!("No bill at {}, starting empty", path.display());
            return BillState::default();
        }
        Err(err) => {
            log::warn!("Couldn't read {}: {err}. Starting empty", path.display());
            return BillState::default();
        }
    };
    match serde_json::from_slice(&bytes) {
        Ok(state) => state,
        Err(err) => {
            log::warn!("Couldn't parse {}: {err}. Starting empty", path.display());
            BillState::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::Price;
    use tempfile::TempDir;

    fn setup() -> (BillStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = BillStore::load(temp_dir.path().join("bill.json"));
        (store, temp_dir)
    }

    fn names(names: &[&str]) -> Vec<PersonName> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[actix_web::test]
    async fn missing_file_starts_empty() {
        let (store, _temp) = setup();

        assert_eq!(store.snapshot().await, BillState::default());
        assert!(!store.path().exists());
    }

    #[actix_web::test]
    async fn corrupt_file_starts_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bill.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let store = BillStore::load(&path);

        assert_eq!(store.snapshot().await, BillState::default());
    }

    #[actix_web::test]
    async fn reload_reproduces_last_write() {
        let (store, temp) = setup();
        let dishes = vec![Dish::new("Curry", 12.0), Dish::new("Tea", 2.5)];
        let selections: Selections = [("0".to_string(), names(&["Ann", "Bo"]))].into();

        store.replace_dishes(dishes.clone()).await.unwrap();
        store.replace_people(names(&["Ann", "Bo"])).await.unwrap();
        store.replace_selections(selections.clone()).await.unwrap();

        let reloaded = BillStore::load(temp.path().join("bill.json"));
        let state = reloaded.snapshot().await;
        assert_eq!(state.dishes, dishes);
        assert_eq!(state.people, names(&["Ann", "Bo"]));
        assert_eq!(state.selections, selections);
    }

    #[actix_web::test]
    async fn file_layout_has_three_keys() {
        let (store, _temp) = setup();
        store.replace_people(names(&["Ann"])).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(
            raw,
            serde_json::json!({ "dishes": [], "people": ["Ann"], "selections": {} })
        );
        assert!(!store.path().with_extension("json.tmp").exists());
    }

    #[actix_web::test]
    async fn save_creates_missing_directories() {
        let temp = TempDir::new().unwrap();
        let store = BillStore::load(temp.path().join("nested").join("bill.json"));

        store.replace_people(names(&["Ann"])).await.unwrap();

        assert!(store.path().exists());
    }

    #[actix_web::test]
    async fn reset_clears_and_persists() {
        let (store, temp) = setup();
        store.replace_dishes(vec![Dish::new("Curry", 12.0)]).await.unwrap();
        store.replace_people(names(&["Ann"])).await.unwrap();

        store.reset().await.unwrap();

        assert_eq!(store.snapshot().await, BillState::default());
        let reloaded = BillStore::load(temp.path().join("bill.json"));
        assert_eq!(reloaded.snapshot().await, BillState::default());
    }

    #[actix_web::test]
    async fn calculate_commits_selections() {
        let (store, _temp) = setup();
        store.replace_dishes(vec![Dish::new("Curry", 12.0)]).await.unwrap();
        store.replace_people(names(&["Ann", "Bo"])).await.unwrap();
        let selections: Selections = [("0".to_string(), names(&["Ann", "Bo"]))].into();

        let balance = store.calculate(selections.clone()).await.unwrap();

        assert_eq!(balance.get("Ann"), Some(6.0));
        assert_eq!(store.selections().await, selections);
    }

    #[actix_web::test]
    async fn calculate_keeps_selections_when_price_is_malformed() {
        let (store, temp) = setup();
        let dish = Dish {
            price: Some(Some(Price::Text("lots".to_string()))),
            ..Dish::default()
        };
        store.replace_dishes(vec![dish]).await.unwrap();
        store.replace_people(names(&["Ann"])).await.unwrap();
        let selections: Selections = [("0".to_string(), names(&["Ann"]))].into();

        let err = store.calculate(selections.clone()).await.unwrap_err();

        assert!(matches!(err, StoreError::Split(_)));
        let reloaded = BillStore::load(temp.path().join("bill.json"));
        assert_eq!(reloaded.selections().await, selections);
    }
}
