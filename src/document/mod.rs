//! Lazily-loaded structured documents bound to a file
//!
//! A [`Document`] holds an in-memory tree that is loaded on first touch,
//! tracks whether it has unsaved writes, and writes back only when asked.
//!
//! # Lifecycle
//!
//! | State | Entered by | Left by |
//! |-------|------------|---------|
//! | Unloaded | construction, `unload`, successful `save`, external change while clean | any read or write, `load` |
//! | Loaded, clean | `load`, `reload` | a write, an unload |
//! | Loaded, dirty | `set` / `remove` | `save`, `reload`, `unload` |
//!
//! Load and save failures are logged and swallowed: a missing or corrupt
//! file reads as an empty document (when creation is allowed) and a failed
//! save leaves the in-memory tree as the only copy until the next attempt.

pub mod descriptor;
pub mod json;
pub mod properties;
pub mod yaml;

pub use descriptor::{Descriptor, DescriptorNode};
pub use json::Json;
pub use properties::{Properties, PropertiesTree};
pub use yaml::Yaml;

use crate::config::DocumentsConfig;
use crate::error::StashResult;
use crate::path::PathError;
use crate::watch::{ChangeSource, Subscription};
use parking_lot::Mutex;
use serde_json::Value;
use std::fmt;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, info, warn};

/// An on-disk representation of a document tree
pub trait Encoding: Send + Sync + 'static {
    type Tree: Send + 'static;

    const FORMAT: DocumentFormat;

    fn empty() -> Self::Tree;

    fn parse(text: &str) -> StashResult<Self::Tree>;

    fn render(tree: &Self::Tree) -> StashResult<String>;

    fn get(tree: &Self::Tree, address: &str) -> Option<Value>;

    /// Write or (with `None`) remove the addressed node
    fn set(tree: &mut Self::Tree, address: &str, value: Option<Value>) -> Result<(), PathError>;

    /// The whole tree as JSON
    fn to_value(tree: &Self::Tree) -> Value;
}

/// The contract shared by every encoding, usable as a trait object
pub trait DocumentStore: Send + Sync {
    /// Read the addressed node, loading the document first if needed
    fn get(&self, address: &str) -> Option<Value>;

    /// Write (or with `None` remove) the addressed node and mark the document dirty
    fn set(&self, address: &str, value: Option<Value>) -> Result<(), PathError>;

    /// Discard in-memory state, including unsaved writes, and load again
    fn reload(&self);

    /// Write to disk if dirty or `force`; returns whether a write happened
    fn save(&self, force: bool) -> bool;

    /// The whole tree as JSON, if the document could be loaded
    fn snapshot(&self) -> Option<Value>;

    fn path(&self) -> &Path;

    fn format(&self) -> DocumentFormat;
}

/// Supported encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Properties,
    Json,
    Yaml,
}

impl DocumentFormat {
    /// Pick an encoding from the file extension; anything unknown is properties
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => {
                Self::Yaml
            }
            _ => Self::Properties,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Properties => "properties",
            Self::Json => "json",
            Self::Yaml => "yaml",
        };
        write!(f, "{}", name)
    }
}

/// Construction options for a document
#[derive(Debug, Clone)]
pub struct DocumentOptions {
    /// Load at construction instead of on first touch
    pub eager: bool,

    /// Treat a missing or unreadable file as an empty document
    pub create_if_missing: bool,

    /// Defaults for required nodes, applied on save
    pub descriptor: Option<Arc<Descriptor>>,
}

impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            eager: false,
            create_if_missing: true,
            descriptor: None,
        }
    }
}

impl DocumentOptions {
    pub fn from_config(config: &DocumentsConfig) -> Self {
        Self {
            eager: config.eager,
            create_if_missing: config.create_if_missing,
            descriptor: None,
        }
    }

    pub fn with_descriptor(mut self, descriptor: Descriptor) -> Self {
        self.descriptor = Some(Arc::new(descriptor));
        self
    }
}

struct DocState<T> {
    tree: Option<T>,
    dirty: bool,
}

/// A structured document bound to a file path
pub struct Document<E: Encoding> {
    path: PathBuf,
    options: DocumentOptions,
    state: Arc<Mutex<DocState<E::Tree>>>,
    subscription: Option<Subscription>,
    _encoding: PhantomData<E>,
}

impl<E: Encoding> Document<E> {
    /// Bind a document to `path`.
    ///
    /// With a change source, external edits invalidate the cached tree while
    /// it has no unsaved writes. A watch that cannot be set up is logged and
    /// the document works without invalidation.
    pub fn open(
        path: impl Into<PathBuf>,
        options: DocumentOptions,
        source: Option<&dyn ChangeSource>,
    ) -> Self {
        let path = path.into();
        let state = Arc::new(Mutex::new(DocState {
            tree: None,
            dirty: false,
        }));

        let subscription = source.and_then(|source| {
            let weak = Arc::downgrade(&state);
            match source.subscribe(&path, Arc::new(move |changed: &Path| invalidate::<E>(&weak, changed))) {
                Ok(subscription) => Some(subscription),
                Err(e) => {
                    warn!("Not watching {}: {}", path.display(), e);
                    None
                }
            }
        });

        let document = Self {
            path,
            options,
            state,
            subscription,
            _encoding: PhantomData,
        };

        if document.options.eager {
            document.load();
        }
        document
    }

    /// Read the addressed node
    pub fn get(&self, address: &str) -> Option<Value> {
        let mut state = self.state.lock();
        self.load_locked(&mut state);
        state.tree.as_ref().and_then(|tree| E::get(tree, address))
    }

    pub fn contains(&self, address: &str) -> bool {
        self.get(address).is_some()
    }

    /// Write the addressed node; `None` removes it
    pub fn set(&self, address: &str, value: Option<Value>) -> Result<(), PathError> {
        let mut state = self.state.lock();
        self.load_locked(&mut state);
        let Some(tree) = state.tree.as_mut() else {
            debug!("Ignoring write to absent {}", self.path.display());
            return Ok(());
        };
        E::set(tree, address, value)?;
        state.dirty = true;
        Ok(())
    }

    pub fn remove(&self, address: &str) -> Result<(), PathError> {
        self.set(address, None)
    }

    /// Populate the tree from disk unless already loaded
    pub fn load(&self) {
        let mut state = self.state.lock();
        self.load_locked(&mut state);
    }

    pub fn reload(&self) {
        let mut state = self.state.lock();
        state.tree = None;
        state.dirty = false;
        self.load_locked(&mut state);
    }

    /// Drop the in-memory tree and any unsaved writes
    pub fn unload(&self) {
        let mut state = self.state.lock();
        state.tree = None;
        state.dirty = false;
    }

    /// Write the tree to disk if dirty or `force`.
    ///
    /// Required descriptor nodes that are absent get their defaults first.
    /// A successful save clears the dirty flag and unloads the tree.
    pub fn save(&self, force: bool) -> bool {
        let mut state = self.state.lock();
        if !force && !state.dirty {
            return false;
        }
        self.load_locked(&mut state);
        let Some(tree) = state.tree.as_mut() else {
            return false;
        };

        if let Some(descriptor) = &self.options.descriptor {
            for (address, default) in descriptor.defaults() {
                if E::get(tree, address).is_some() {
                    continue;
                }
                if let Err(e) = E::set(tree, address, Some(default.clone())) {
                    warn!("Skipping default for {}: {}", address, e);
                }
            }
        }

        let text = match E::render(tree) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to encode {}: {}", self.path.display(), e);
                return false;
            }
        };

        if let Some(subscription) = &self.subscription {
            subscription.suspend();
        }
        let written = write_file(&self.path, &text);
        if let Some(subscription) = &self.subscription {
            subscription.resume();
        }

        match written {
            Ok(()) => {
                state.dirty = false;
                state.tree = None;
                info!("Saved {} document {}", E::FORMAT, self.path.display());
                true
            }
            Err(e) => {
                warn!("Failed to save {}: {}", self.path.display(), e);
                false
            }
        }
    }

    /// The whole tree as JSON
    pub fn snapshot(&self) -> Option<Value> {
        let mut state = self.state.lock();
        self.load_locked(&mut state);
        state.tree.as_ref().map(E::to_value)
    }

    pub fn is_loaded(&self) -> bool {
        self.state.lock().tree.is_some()
    }

    pub fn is_dirty(&self) -> bool {
        self.state.lock().dirty
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether external edits are being tracked
    pub fn is_watched(&self) -> bool {
        self.subscription.is_some()
    }

    /// Release the document and its watch without saving
    pub fn dispose(self) {
        if self.is_dirty() {
            debug!("Discarding unsaved changes to {}", self.path.display());
        }
    }

    fn load_locked(&self, state: &mut DocState<E::Tree>) {
        if state.tree.is_some() {
            return;
        }

        let loaded = match std::fs::read_to_string(&self.path) {
            Ok(text) => match E::parse(&text) {
                Ok(tree) => Some(tree),
                Err(e) => {
                    warn!("Ignoring unreadable {}: {}", self.path.display(), e);
                    None
                }
            },
            Err(e) if e.kind() == ErrorKind::NotFound => None,
            Err(e) => {
                warn!("Failed to read {}: {}", self.path.display(), e);
                None
            }
        };

        state.tree = match loaded {
            Some(tree) => Some(tree),
            None if self.options.create_if_missing => Some(E::empty()),
            None => None,
        };
        if state.tree.is_some() {
            debug!("Loaded {} document {}", E::FORMAT, self.path.display());
        }
    }
}

impl<E: Encoding> DocumentStore for Document<E> {
    fn get(&self, address: &str) -> Option<Value> {
        Document::get(self, address)
    }

    fn set(&self, address: &str, value: Option<Value>) -> Result<(), PathError> {
        Document::set(self, address, value)
    }

    fn reload(&self) {
        Document::reload(self)
    }

    fn save(&self, force: bool) -> bool {
        Document::save(self, force)
    }

    fn snapshot(&self) -> Option<Value> {
        Document::snapshot(self)
    }

    fn path(&self) -> &Path {
        Document::path(self)
    }

    fn format(&self) -> DocumentFormat {
        E::FORMAT
    }
}

/// Open a document with the encoding picked by `format`
pub fn open_document(
    path: impl Into<PathBuf>,
    format: DocumentFormat,
    options: DocumentOptions,
    source: Option<&dyn ChangeSource>,
) -> Box<dyn DocumentStore> {
    match format {
        DocumentFormat::Properties => Box::new(Document::<Properties>::open(path, options, source)),
        DocumentFormat::Json => Box::new(Document::<Json>::open(path, options, source)),
        DocumentFormat::Yaml => Box::new(Document::<Yaml>::open(path, options, source)),
    }
}

fn invalidate<E: Encoding>(state: &Weak<Mutex<DocState<E::Tree>>>, changed: &Path) {
    let Some(state) = state.upgrade() else {
        return;
    };
    let mut state = state.lock();
    if state.dirty {
        debug!("Keeping local edits over external change to {}", changed.display());
    } else if state.tree.take().is_some() {
        debug!("Invalidated {} after external change", changed.display());
    }
}

fn write_file(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::watch::{NativeMultiplexer, PollingMultiplexer};
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tempfile::TempDir;

    fn lazy() -> DocumentOptions {
        DocumentOptions::default()
    }

    fn wait_for(mut check: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while Instant::now() < deadline {
            if check() {
                return true;
            }
            std::thread::sleep(Duration::from_millis(20));
        }
        false
    }

    #[test]
    fn properties_scenario() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("app.properties");
        std::fs::write(&path, "#hello\na=1\n").unwrap();

        let doc = Document::<Properties>::open(&path, lazy(), None);
        doc.set("a", Some(json!("2"))).unwrap();
        assert!(doc.save(true));

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "#hello\na=2\n");
    }

    #[test]
    fn lazy_until_first_touch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        let doc = Document::<Json>::open(&path, lazy(), None);
        assert!(!doc.is_loaded());
        assert_eq!(doc.get("a"), Some(json!(1)));
        assert!(doc.is_loaded());

        let eager = Document::<Json>::open(
            &path,
            DocumentOptions {
                eager: true,
                ..lazy()
            },
            None,
        );
        assert!(eager.is_loaded());
    }

    #[test]
    fn unforced_save_without_writes_is_noop() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        // Deliberately not in the pretty format a save would produce
        std::fs::write(&path, r#"{"a":1}"#).unwrap();

        let doc = Document::<Json>::open(&path, lazy(), None);
        assert_eq!(doc.get("a"), Some(json!(1)));
        assert!(!doc.save(false));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"{"a":1}"#);
    }

    #[test]
    fn save_then_reload_keeps_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.yaml");

        let doc = Document::<Yaml>::open(&path, lazy(), None);
        doc.set("server.port", Some(json!(8080))).unwrap();
        doc.set("server.hosts[0]", Some(json!("a"))).unwrap();
        doc.set("server.hosts[-1]", Some(json!("b"))).unwrap();
        assert!(doc.is_dirty());
        assert!(doc.save(false));
        assert!(!doc.is_dirty());
        assert!(!doc.is_loaded());

        doc.reload();
        assert_eq!(doc.get("server.port"), Some(json!(8080)));
        assert_eq!(doc.get("server.hosts"), Some(json!(["b"])));
    }

    #[test]
    fn forced_save_writes_descriptor_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.json");
        let descriptor = Descriptor::new()
            .with_node(DescriptorNode::required("java.memory", json!(2048)))
            .with_node(DescriptorNode::optional("java.args"));

        let doc = Document::<Json>::open(&path, lazy().with_descriptor(descriptor), None);
        assert!(doc.save(true));

        let written: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(written, json!({"java": {"memory": 2048}}));
    }

    #[test]
    fn defaults_do_not_override_existing_values() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("settings.properties");
        std::fs::write(&path, "memory=512\n").unwrap();
        let descriptor = Descriptor::new()
            .with_node(DescriptorNode::required("memory", json!("2048")))
            .with_node(DescriptorNode::required("name", json!("default")));

        let doc = Document::<Properties>::open(&path, lazy().with_descriptor(descriptor), None);
        assert!(doc.save(true));
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "memory=512\nname=default\n"
        );
    }

    #[test]
    fn corrupt_file_reads_as_empty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        std::fs::write(&path, "{not json").unwrap();

        let doc = Document::<Json>::open(&path, lazy(), None);
        assert_eq!(doc.get("a"), None);
        assert_eq!(doc.snapshot(), Some(json!({})));
    }

    #[test]
    fn missing_file_without_create_stays_absent() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("absent.json");
        let options = DocumentOptions {
            create_if_missing: false,
            ..lazy()
        };

        let doc = Document::<Json>::open(&path, options, None);
        doc.set("a", Some(json!(1))).unwrap();
        assert!(!doc.is_loaded());
        assert!(!doc.is_dirty());
        assert!(!doc.save(true));
        assert!(!path.exists());
    }

    #[test]
    fn malformed_address_is_an_error() {
        let temp = TempDir::new().unwrap();
        let doc = Document::<Json>::open(temp.path().join("doc.json"), lazy(), None);
        assert!(doc.set("a[", Some(json!(1))).is_err());
        assert!(!doc.is_dirty());
        assert_eq!(doc.get("a["), None);
    }

    #[test]
    fn reload_discards_local_edits() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        let doc = Document::<Json>::open(&path, lazy(), None);
        doc.set("a", Some(json!(2))).unwrap();
        doc.reload();
        assert!(!doc.is_dirty());
        assert_eq!(doc.get("a"), Some(json!(1)));
    }

    #[test]
    fn external_edit_invalidates_clean_document() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.json");
        std::fs::write(&path, r#"{"a": 1}"#).unwrap();

        let mux = NativeMultiplexer::new();
        let doc = Document::<Json>::open(&path, lazy(), Some(&mux));
        assert!(doc.is_watched());
        assert_eq!(doc.get("a"), Some(json!(1)));

        std::fs::write(&path, r#"{"a": 2}"#).unwrap();
        assert!(wait_for(|| !doc.is_loaded()));
        assert_eq!(doc.get("a"), Some(json!(2)));
    }

    #[test]
    fn external_edit_is_ignored_while_dirty() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.properties");
        std::fs::write(&path, "a=1\n").unwrap();

        let mux = PollingMultiplexer::new(Duration::from_millis(20)).unwrap();
        let doc = Document::<Properties>::open(&path, lazy(), Some(&mux));
        doc.set("b", Some(json!("local"))).unwrap();

        std::fs::write(&path, "a=external, longer\n").unwrap();
        let before = mux.scan_count();
        assert!(wait_for(|| mux.scan_count() >= before + 3));

        assert!(doc.is_loaded());
        assert_eq!(doc.get("b"), Some(json!("local")));
        assert_eq!(doc.get("a"), Some(json!("1")));
    }

    #[test]
    fn store_trait_dispatches_by_format() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("doc.yml");
        let store = open_document(&path, DocumentFormat::from_path(&path), lazy(), None);

        assert_eq!(store.format(), DocumentFormat::Yaml);
        store.set("list[0]", Some(json!(1))).unwrap();
        assert!(store.save(false));
        store.reload();
        assert_eq!(store.get("list[-1]"), Some(json!(1)));
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(DocumentFormat::from_path(Path::new("a.JSON")), DocumentFormat::Json);
        assert_eq!(DocumentFormat::from_path(Path::new("a.yaml")), DocumentFormat::Yaml);
        assert_eq!(
            DocumentFormat::from_path(Path::new("gradle.properties")),
            DocumentFormat::Properties
        );
        assert_eq!(DocumentFormat::Json.to_string(), "json");
    }
}
