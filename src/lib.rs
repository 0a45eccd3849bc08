// Module declarations
pub mod background;
pub mod error;
pub mod notifications;
pub mod page;
pub mod popup;
pub mod rules;
pub mod settings;

pub use background::{BackgroundEvent, Coordinator};
pub use error::{StoreError, StoreResult};
pub use page::{Document, DomTree, PageConfig, PageEvent, PageWatcher};
pub use popup::{PopupController, PopupState};
pub use rules::{evaluate, should_blur, BlurContext, Decision, ImageFacts, Rect};
pub use settings::{MemoryStorage, Settings, Storage, StorageArea, StorageBackend, Theme};
