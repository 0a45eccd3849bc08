// Page Watcher
//
// Keeps every image's blur marker in step with the rule evaluator. One
// watcher exists per page; it owns the settings snapshot and is driven from
// a single task, so the snapshot needs no locking.

use std::collections::HashSet;
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;

use super::dom::{is_image_tag, Document, ReadyState};
use super::toast::ToastQueue;
use super::{KeyEvent, PageConfig};
use crate::rules::{self, BlurContext, Decision, ImageFacts};
use crate::settings::storage::parse_host_list;
use crate::settings::{
    whitelist, Storage, StorageArea, StorageEvent, Subscription, KEY_TEMP_WHITELIST, KEY_WHITELIST,
};

/// Events delivered by the hosting page
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent<N> {
    /// The document finished parsing
    DomContentLoaded,
    /// One mutation batch of added nodes
    NodesAdded(Vec<N>),
    /// An image fired its `load` event
    ImageLoaded(N),
    KeyDown(KeyEvent),
}

pub struct PageWatcher<D: Document> {
    doc: D,
    storage: Storage,
    hostname: String,
    context: BlurContext,
    config: PageConfig,
    /// Whether the structural change observer is installed
    observing: bool,
    /// Images waiting on a one-shot load re-check
    pending_loads: HashSet<D::Node>,
    toasts: ToastQueue<D::Node>,
    changes: Option<Subscription>,
}

impl<D: Document> PageWatcher<D> {
    pub fn new(doc: D, storage: Storage, hostname: impl Into<String>, context: BlurContext) -> Self {
        let config = PageConfig::default();
        Self {
            doc,
            storage,
            hostname: hostname.into(),
            context,
            toasts: ToastQueue::new(&config),
            config,
            observing: false,
            pending_loads: HashSet::new(),
            changes: None,
        }
    }

    /// Read the current settings for `page_url` and subscribe to changes.
    ///
    /// The subscription is opened before reading so no change between the
    /// read and the first event is lost.
    pub async fn load(doc: D, storage: Storage, page_url: &str) -> Self {
        let changes = storage.subscribe();
        let settings = storage.settings().await;
        let temp_whitelist = storage.temp_whitelist().await;
        let hostname = whitelist::host_from_url(page_url).unwrap_or_default();

        log::debug!("Page watcher loaded for '{}'", hostname);

        let mut watcher = Self::new(doc, storage, hostname, BlurContext::new(settings, temp_whitelist));
        watcher.changes = Some(changes);
        watcher
    }

    pub fn with_config(mut self, config: PageConfig) -> Self {
        self.toasts = ToastQueue::new(&config);
        self.config = config;
        self
    }

    pub fn hostname(&self) -> &str {
        &self.hostname
    }

    pub fn context(&self) -> &BlurContext {
        &self.context
    }

    pub fn config(&self) -> &PageConfig {
        &self.config
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn into_document(self) -> D {
        self.doc
    }

    pub fn is_observing(&self) -> bool {
        self.observing
    }

    /// Images currently carrying the blur marker
    pub fn blurred_images(&self) -> Vec<D::Node> {
        self.doc.elements_with_class(&self.config.blur_class)
    }

    // ==================== Activation ====================

    /// Activate now, or wait for `DomContentLoaded` while still parsing
    pub fn start(&mut self) {
        if self.doc.ready_state() == ReadyState::Loading {
            log::debug!("Document still loading, deferring activation");
            return;
        }
        self.init();
    }

    fn init(&mut self) {
        if self.observing {
            return;
        }
        self.update_css_variables();
        self.process_images();
        self.observing = true;
    }

    /// Publish the blur radius as a root style variable
    pub fn update_css_variables(&mut self) {
        let radius = self.context.settings.blur_radius_px();
        self.doc
            .set_root_style_property(&self.config.blur_variable, &format!("{}px", radius));
    }

    // ==================== Image Processing ====================

    /// Apply the blur decision to every image in the document
    pub fn process_images(&mut self) {
        self.prune_pending_loads();
        for img in self.doc.images() {
            self.apply_blur_to_image(img);
        }
    }

    /// Images still waiting on their load re-check
    pub fn pending_load_count(&self) -> usize {
        self.pending_loads.len()
    }

    /// Forget load re-checks for images no longer in the document
    fn prune_pending_loads(&mut self) {
        let doc = &self.doc;
        self.pending_loads.retain(|img| doc.contains(*img));
    }

    /// Strip the blur marker from every image
    pub fn remove_all_blur(&mut self) {
        for img in self.doc.elements_with_class(&self.config.blur_class) {
            self.doc.remove_class(img, &self.config.blur_class);
        }
    }

    fn apply_blur_to_image(&mut self, img: D::Node) {
        if !self.context.is_active_for(&self.hostname) {
            self.doc.remove_class(img, &self.config.blur_class);
            return;
        }

        self.check_and_apply(img);

        // Layout may change once the intrinsic size is known
        if !self.doc.is_complete(img) {
            self.pending_loads.insert(img);
        }
    }

    fn check_and_apply(&mut self, img: D::Node) {
        let classes = self.doc.class_list(img);
        let facts = ImageFacts {
            rect: self.doc.bounding_rect(img),
            classes: &classes,
        };

        let decision = rules::evaluate(&facts, &self.context, &self.hostname);
        match decision {
            Decision::Blur => self.doc.add_class(img, &self.config.blur_class),
            other => {
                log::trace!("Not blurring {:?}: {:?}", img, other);
                self.doc.remove_class(img, &self.config.blur_class);
            }
        }
    }

    /// Handle one batch of added nodes from the structural observer
    pub fn on_nodes_added(&mut self, nodes: &[D::Node]) {
        if !self.observing {
            return;
        }

        for &node in nodes {
            match self.doc.tag_name(node) {
                None => continue,
                Some(tag) if is_image_tag(&tag) => self.apply_blur_to_image(node),
                Some(_) => {
                    for img in self.doc.descendant_images(node) {
                        self.apply_blur_to_image(img);
                    }
                }
            }
        }
    }

    /// One-shot re-check for an image that finished loading
    pub fn on_image_loaded(&mut self, img: D::Node) {
        if !self.pending_loads.remove(&img) {
            return;
        }
        if self.doc.contains(img) {
            self.check_and_apply(img);
        }
    }

    // ==================== Settings Changes ====================

    /// Apply a store change to the cached snapshot and re-scan.
    ///
    /// Returns false when the change does not concern this page.
    pub fn on_storage_event(&mut self, event: &StorageEvent) -> bool {
        let relevant = match event.area {
            StorageArea::Sync => {
                for (key, change) in &event.changes {
                    match &change.new_value {
                        Some(value) => {
                            self.context.settings.apply_value(key, value.clone());
                        }
                        None => self.context.settings.reset_value(key),
                    }
                }
                !event.changes.is_empty()
            }
            StorageArea::Local => match event.changes.get(KEY_TEMP_WHITELIST) {
                Some(change) => {
                    self.context.temp_whitelist = parse_host_list(change.new_value.as_ref());
                    true
                }
                None => false,
            },
        };

        if relevant {
            self.refresh();
        }
        relevant
    }

    /// Re-derive every blur marker from the current snapshot
    pub fn refresh(&mut self) {
        self.update_css_variables();
        self.remove_all_blur();
        self.prune_pending_loads();

        if self.context.is_active_for(&self.hostname) {
            self.process_images();
        }
    }

    // ==================== Keyboard Shortcut ====================

    /// Toggle the site in the permanent whitelist on Alt+B.
    ///
    /// Returns true when the key was consumed, so the host can prevent the
    /// browser's default action. Pages without a hostname ignore the key.
    pub async fn on_key_down(&mut self, key: &KeyEvent, now: Instant) -> bool {
        if !self.config.toggle_shortcut.matches(key) {
            return false;
        }
        if self.hostname.is_empty() {
            log::debug!("Ignoring whitelist shortcut: page has no hostname");
            return false;
        }

        let whitelisted = whitelist::toggle(&mut self.context.settings.whitelist, &self.hostname);
        let saved = self
            .storage
            .try_set_value(KEY_WHITELIST, Value::from(self.context.settings.whitelist.clone()))
            .await;
        if let Err(e) = saved {
            log::error!("Failed to save whitelist shortcut: {:#}", e);
            whitelist::toggle(&mut self.context.settings.whitelist, &self.hostname);
            return true;
        }

        log::info!(
            "{} '{}' via keyboard shortcut",
            if whitelisted { "Whitelisted" } else { "Un-whitelisted" },
            self.hostname
        );

        let message = if whitelisted {
            "Site whitelisted"
        } else {
            "Site removed from whitelist"
        };
        self.toasts.show(&mut self.doc, &self.config, message, now);

        self.refresh();
        true
    }

    /// Advance on-page notifications to `now`
    pub fn fire_toasts(&mut self, now: Instant) {
        self.toasts.fire_due(&mut self.doc, &self.config, now);
    }

    // ==================== Event Loop ====================

    /// Dispatch a single page event
    pub async fn handle_event(&mut self, event: PageEvent<D::Node>) -> bool {
        match event {
            PageEvent::DomContentLoaded => {
                self.init();
                true
            }
            PageEvent::NodesAdded(nodes) => {
                self.on_nodes_added(&nodes);
                true
            }
            PageEvent::ImageLoaded(img) => {
                self.on_image_loaded(img);
                true
            }
            PageEvent::KeyDown(key) => self.on_key_down(&key, now()).await,
        }
    }

    /// Activate, then process page events, store changes and notification
    /// timers until the host closes `events`. Returns the watcher so the host
    /// can inspect or reuse the document.
    pub async fn run(mut self, mut events: mpsc::UnboundedReceiver<PageEvent<D::Node>>) -> Self {
        let mut changes = self.changes.take();
        self.start();

        loop {
            let deadline = self.toasts.next_deadline();

            tokio::select! {
                biased;

                event = events.recv() => match event {
                    Some(event) => {
                        self.handle_event(event).await;
                    }
                    None => break,
                },
                change = next_change(&mut changes) => match change {
                    Some(change) => {
                        self.on_storage_event(&change);
                    }
                    None => {
                        log::warn!("Storage change stream closed");
                        changes = None;
                    }
                },
                _ = sleep_until(deadline) => self.fire_toasts(now()),
            }
        }

        self.changes = changes;
        self
    }
}

/// Current time on the runtime clock (honours paused time)
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

async fn next_change(changes: &mut Option<Subscription>) -> Option<StorageEvent> {
    match changes {
        Some(subscription) => subscription.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(at) => tokio::time::sleep_until(tokio::time::Instant::from_std(at)).await,
        None => std::future::pending().await,
    }
}
