//! Hand-written fakes for the signing collaborators

#![allow(dead_code)]

use async_trait::async_trait;
use relctl_core::{Error, Result};
use relctl_sign::{
    BusMessage, CommitSignature, CommitStore, DetachedVerifier, InMemoryBus, MessageBus,
    ObjectStore, Subscription,
};
use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

pub const GOOD_SIGNATURE: &[u8] = b"good signature";
pub const BAD_SIGNATURE: &[u8] = b"bad signature";

// =============================================================================
// Object storage
// =============================================================================

#[derive(Default)]
struct StoreState {
    objects: HashMap<String, Vec<u8>>,
    uploads: Vec<String>,
    deletes: Vec<String>,
    public: HashSet<String>,
}

#[derive(Clone, Default)]
pub struct MockObjectStore {
    state: Arc<Mutex<StoreState>>,
}

impl MockObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: &str, data: &[u8]) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), data.to_vec());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.state.lock().unwrap().objects.contains_key(key)
    }

    pub fn uploads(&self) -> Vec<String> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.state.lock().unwrap().deletes.clone()
    }

    pub fn is_public(&self, key: &str) -> bool {
        self.state.lock().unwrap().public.contains(key)
    }

    pub fn public_count(&self) -> usize {
        self.state.lock().unwrap().public.len()
    }
}

#[async_trait]
impl ObjectStore for MockObjectStore {
    async fn upload(&self, local: &Path, key: &str) -> Result<()> {
        let data = std::fs::read(local)?;
        let mut state = self.state.lock().unwrap();
        state.objects.insert(key.to_string(), data);
        state.uploads.push(key.to_string());
        Ok(())
    }

    async fn download(&self, key: &str, local: &Path) -> Result<()> {
        let data = self
            .state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .cloned()
            .ok_or_else(|| Error::storage(format!("no such key: {}", key)))?;
        std::fs::write(local, data)?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.objects.remove(key);
        state.deletes.push(key.to_string());
        Ok(())
    }

    async fn set_public_read(&self, key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if !state.objects.contains_key(key) {
            return Err(Error::storage(format!("no such key: {}", key)));
        }
        state.public.insert(key.to_string());
        Ok(())
    }
}

// =============================================================================
// Signing authority
// =============================================================================

/// How the fake authority answers
#[derive(Clone, Debug)]
pub enum Reply {
    Status {
        status: String,
        failure_message: Option<String>,
    },
    /// Never answer
    Silent,
}

impl Reply {
    pub fn success() -> Self {
        Self::status("success", None)
    }

    pub fn status(status: &str, failure_message: Option<&str>) -> Self {
        Reply::Status {
            status: status.to_string(),
            failure_message: failure_message.map(str::to_string),
        }
    }
}

struct AuthorityState {
    reply: Reply,
    signature: Vec<u8>,
    /// Answer for an unrelated request before the real reply
    stray_first: bool,
    requests: Vec<BusMessage>,
}

/// Bus whose far side behaves like a signing authority.
///
/// Requests get a reply on `<topic>.finished`; successful ones also leave
/// signatures in the object store where the workflows expect them.
#[derive(Clone)]
pub struct FakeAuthority {
    bus: Arc<InMemoryBus>,
    store: MockObjectStore,
    state: Arc<Mutex<AuthorityState>>,
}

impl FakeAuthority {
    pub fn new(store: MockObjectStore, reply: Reply) -> Self {
        Self {
            bus: Arc::new(InMemoryBus::new()),
            store,
            state: Arc::new(Mutex::new(AuthorityState {
                reply,
                signature: GOOD_SIGNATURE.to_vec(),
                stray_first: false,
                requests: Vec::new(),
            })),
        }
    }

    /// Sign with a signature the verifiers reject
    pub fn with_bad_signature(self) -> Self {
        self.state.lock().unwrap().signature = BAD_SIGNATURE.to_vec();
        self
    }

    pub fn with_stray_reply(self) -> Self {
        self.state.lock().unwrap().stray_first = true;
        self
    }

    pub fn requests(&self) -> Vec<BusMessage> {
        self.state.lock().unwrap().requests.clone()
    }

    fn sign_objects(&self, body: &Value, signature: &[u8]) {
        if let Some(commit) = body.get("commit_object").and_then(Value::as_str) {
            self.store
                .put(&format!("{}-detached.commitmeta", commit), signature);
        }
        if let Some(artifacts) = body.get("artifacts").and_then(Value::as_array) {
            for artifact in artifacts {
                if let Some(file) = artifact["file"].as_str() {
                    self.store.put(&format!("{}.sig", file), signature);
                }
            }
        }
    }
}

#[async_trait]
impl MessageBus for FakeAuthority {
    async fn subscribe(&self, topic: &str) -> Result<Subscription> {
        self.bus.subscribe(topic).await
    }

    async fn publish(&self, message: BusMessage) -> Result<()> {
        let (reply, signature, stray) = {
            let mut state = self.state.lock().unwrap();
            state.requests.push(message.clone());
            (state.reply.clone(), state.signature.clone(), state.stray_first)
        };

        let Reply::Status {
            status,
            failure_message,
        } = reply
        else {
            return Ok(());
        };

        if status.eq_ignore_ascii_case("success") {
            self.sign_objects(&message.body, &signature);
        }

        let topic = format!("{}.finished", message.topic);
        if stray {
            self.bus
                .publish(BusMessage {
                    topic: topic.clone(),
                    priority: None,
                    body: json!({ "status": "failure", "request_id": "someone-else" }),
                })
                .await?;
        }

        let mut body = json!({
            "status": status,
            "request_id": message.body["request_id"].clone(),
        });
        if let Some(msg) = failure_message {
            body["failure-message"] = Value::from(msg);
        }
        self.bus
            .publish(BusMessage {
                topic,
                priority: None,
                body,
            })
            .await
    }
}

// =============================================================================
// Commit store
// =============================================================================

struct CommitState {
    supports_replace: bool,
    fail_export: bool,
    signature_count: usize,
    anchors_added: Vec<String>,
    anchors_removed: Vec<String>,
    detached: HashMap<String, Vec<u8>>,
    replaced: usize,
    exported: usize,
}

#[derive(Clone)]
pub struct MockCommitStore {
    objects_dir: PathBuf,
    state: Arc<Mutex<CommitState>>,
}

impl MockCommitStore {
    /// Commit objects live in `objects_dir`
    pub fn new(objects_dir: impl Into<PathBuf>) -> Self {
        Self {
            objects_dir: objects_dir.into(),
            state: Arc::new(Mutex::new(CommitState {
                supports_replace: true,
                fail_export: false,
                signature_count: 1,
                anchors_added: Vec::new(),
                anchors_removed: Vec::new(),
                detached: HashMap::new(),
                replaced: 0,
                exported: 0,
            })),
        }
    }

    pub fn without_replace_support(self) -> Self {
        self.state.lock().unwrap().supports_replace = false;
        self
    }

    pub fn failing_export(self) -> Self {
        self.state.lock().unwrap().fail_export = true;
        self
    }

    pub fn with_signature_count(self, count: usize) -> Self {
        self.state.lock().unwrap().signature_count = count;
        self
    }

    pub fn anchors_added(&self) -> Vec<String> {
        self.state.lock().unwrap().anchors_added.clone()
    }

    pub fn anchors_removed(&self) -> Vec<String> {
        self.state.lock().unwrap().anchors_removed.clone()
    }

    pub fn replaced(&self) -> usize {
        self.state.lock().unwrap().replaced
    }

    pub fn exported(&self) -> usize {
        self.state.lock().unwrap().exported
    }
}

#[async_trait]
impl CommitStore for MockCommitStore {
    fn commit_object_path(&self, checksum: &str) -> PathBuf {
        self.objects_dir.join(format!("{}.commit", checksum))
    }

    async fn write_detached_metadata(&self, checksum: &str, metadata: &Path) -> Result<()> {
        let data = std::fs::read(metadata)?;
        self.state
            .lock()
            .unwrap()
            .detached
            .insert(checksum.to_string(), data);
        Ok(())
    }

    async fn add_trust_anchor(&self, name: &str, gpg_key_path: &Path) -> Result<()> {
        assert!(gpg_key_path.exists(), "trust anchor key must exist");
        self.state
            .lock()
            .unwrap()
            .anchors_added
            .push(name.to_string());
        Ok(())
    }

    async fn remove_trust_anchor(&self, name: &str) -> Result<()> {
        self.state
            .lock()
            .unwrap()
            .anchors_removed
            .push(name.to_string());
        Ok(())
    }

    async fn verify_commit(&self, checksum: &str, _anchor: &str) -> Result<Vec<CommitSignature>> {
        let state = self.state.lock().unwrap();
        let valid = state
            .detached
            .get(checksum)
            .is_some_and(|d| d.as_slice() == GOOD_SIGNATURE);
        Ok((0..state.signature_count)
            .map(|i| CommitSignature {
                valid,
                key_id: format!("8A3872BF3228467{}", i),
                name: Some("Example Release".to_string()),
                email: Some("release@example.org".to_string()),
            })
            .collect())
    }

    async fn supports_replace_detached_metadata(&self) -> Result<bool> {
        Ok(self.state.lock().unwrap().supports_replace)
    }

    async fn replace_detached_metadata(
        &self,
        checksum: &str,
        src: &Path,
        dest: &Path,
    ) -> Result<()> {
        let mut data = std::fs::read(src)?;
        data.extend_from_slice(format!("\nsigned:{}", checksum).as_bytes());
        std::fs::write(dest, data)?;
        self.state.lock().unwrap().replaced += 1;
        Ok(())
    }

    async fn export_commit(&self, checksum: &str, dest: &Path) -> Result<()> {
        // Leave a partial file behind like an interrupted export would
        std::fs::write(dest, format!("exported:{}", checksum))?;
        let mut state = self.state.lock().unwrap();
        if state.fail_export {
            return Err(Error::tool("ostree", "encapsulate failed"));
        }
        state.exported += 1;
        Ok(())
    }
}

// =============================================================================
// Detached signatures
// =============================================================================

/// Accepts exactly [`GOOD_SIGNATURE`]
#[derive(Clone, Default)]
pub struct MockVerifier {
    checked: Arc<Mutex<Vec<PathBuf>>>,
}

impl MockVerifier {
    pub fn checked(&self) -> Vec<PathBuf> {
        self.checked.lock().unwrap().clone()
    }
}

#[async_trait]
impl DetachedVerifier for MockVerifier {
    async fn verify_detached(
        &self,
        public_key: &Path,
        signature: &Path,
        data: &Path,
    ) -> Result<bool> {
        assert!(public_key.exists(), "public key must exist");
        assert!(data.exists(), "signed data must exist");
        self.checked.lock().unwrap().push(data.to_path_buf());
        Ok(std::fs::read(signature)? == GOOD_SIGNATURE)
    }
}
