//! Key storage keyed by key id (`kid`).
//!
//! Several key ids can be valid at once, which is what makes rotation work:
//! tokens signed with a retiring key keep verifying until it is removed,
//! while new tokens are signed with the replacement.
//!
//! Two stores are provided. [`MemoryKeyStore`] is populated explicitly (tests,
//! tooling). [`FsKeyStore`] loads a directory of PEM files once at startup.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use parking_lot::RwLock;

use crate::error::{AuthError, Result};

/// File suffix for verification (public) keys.
pub const PUBLIC_KEY_SUFFIX: &str = ".pub.pem";

/// File suffix for signing (private) keys.
pub const PRIVATE_KEY_SUFFIX: &str = ".pem";

/// The kind of asymmetric key an algorithm needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum KeyFamily {
    Rsa,
    Ec,
    Ed,
}

impl KeyFamily {
    /// `None` for symmetric algorithms, which are never accepted.
    pub(crate) const fn of(algorithm: Algorithm) -> Option<Self> {
        match algorithm {
            Algorithm::RS256
            | Algorithm::RS384
            | Algorithm::RS512
            | Algorithm::PS256
            | Algorithm::PS384
            | Algorithm::PS512 => Some(Self::Rsa),
            Algorithm::ES256 | Algorithm::ES384 => Some(Self::Ec),
            Algorithm::EdDSA => Some(Self::Ed),
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => None,
        }
    }
}

/// Key material stored under one key id.
///
/// The verification half is always present. The signing half is only held by
/// the process that issues tokens.
#[derive(Clone)]
pub struct KeyMaterial {
    signing: Option<EncodingKey>,
    verifying: DecodingKey,
}

impl KeyMaterial {
    /// Wrap already-parsed keys.
    #[must_use]
    pub fn new(signing: Option<EncodingKey>, verifying: DecodingKey) -> Self {
        Self { signing, verifying }
    }

    /// Parse a PEM key pair for `algorithm`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::UnsupportedAlgorithm`] for symmetric algorithms and
    /// [`AuthError::KeyLoad`] if either PEM cannot be parsed.
    pub fn from_pem(algorithm: Algorithm, private_pem: &[u8], public_pem: &[u8]) -> Result<Self> {
        let family = family_for(algorithm)?;
        let signing = parse_private(family, private_pem)?;
        let verifying = parse_public(family, public_pem)?;
        Ok(Self::new(Some(signing), verifying))
    }

    /// Parse a verification-only PEM public key for `algorithm`.
    ///
    /// # Errors
    ///
    /// Same as [`KeyMaterial::from_pem`].
    pub fn verify_only_from_pem(algorithm: Algorithm, public_pem: &[u8]) -> Result<Self> {
        let family = family_for(algorithm)?;
        let verifying = parse_public(family, public_pem)?;
        Ok(Self::new(None, verifying))
    }

    /// The signing key, if this process holds it.
    #[must_use]
    pub const fn signing_key(&self) -> Option<&EncodingKey> {
        self.signing.as_ref()
    }

    /// The verification key.
    #[must_use]
    pub const fn verifying_key(&self) -> &DecodingKey {
        &self.verifying
    }

    /// Returns `true` if tokens can be signed with this material.
    #[must_use]
    pub const fn can_sign(&self) -> bool {
        self.signing.is_some()
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("can_sign", &self.can_sign())
            .finish_non_exhaustive()
    }
}

fn family_for(algorithm: Algorithm) -> Result<KeyFamily> {
    KeyFamily::of(algorithm).ok_or_else(|| AuthError::UnsupportedAlgorithm(format!("{algorithm:?}")))
}

fn parse_private(family: KeyFamily, pem: &[u8]) -> Result<EncodingKey> {
    let parsed = match family {
        KeyFamily::Rsa => EncodingKey::from_rsa_pem(pem),
        KeyFamily::Ec => EncodingKey::from_ec_pem(pem),
        KeyFamily::Ed => EncodingKey::from_ed_pem(pem),
    };
    parsed.map_err(|e| AuthError::KeyLoad {
        path: "<memory>".to_string(),
        reason: format!("private key: {e}"),
    })
}

fn parse_public(family: KeyFamily, pem: &[u8]) -> Result<DecodingKey> {
    let parsed = match family {
        KeyFamily::Rsa => DecodingKey::from_rsa_pem(pem),
        KeyFamily::Ec => DecodingKey::from_ec_pem(pem),
        KeyFamily::Ed => DecodingKey::from_ed_pem(pem),
    };
    parsed.map_err(|e| AuthError::KeyLoad {
        path: "<memory>".to_string(),
        reason: format!("public key: {e}"),
    })
}

/// Lookup of key material by key id.
///
/// Implementations must allow many concurrent readers and occasional
/// exclusive writers. An absent key id is never defaulted.
pub trait KeyLookup: Send + Sync {
    /// Get the material stored under `kid`.
    fn lookup(&self, kid: &str) -> Option<Arc<KeyMaterial>>;

    /// Store `key` under `kid`, replacing any previous material.
    ///
    /// Returns the number of keys in the store afterwards.
    fn add(&self, kid: &str, key: KeyMaterial) -> usize;

    /// Drop the material stored under `kid`.
    ///
    /// Returns the number of keys in the store afterwards.
    fn remove(&self, kid: &str) -> usize;

    /// All stored key ids, sorted.
    fn key_ids(&self) -> Vec<String>;

    /// Number of stored key ids.
    fn len(&self) -> usize {
        self.key_ids().len()
    }

    /// Returns `true` if no keys are stored.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory key store guarded by a read-write lock.
#[derive(Debug, Default)]
pub struct MemoryKeyStore {
    keys: RwLock<HashMap<String, Arc<KeyMaterial>>>,
}

impl MemoryKeyStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding `keys`.
    #[must_use]
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = (S, KeyMaterial)>,
        S: Into<String>,
    {
        let keys = keys
            .into_iter()
            .map(|(kid, key)| (kid.into(), Arc::new(key)))
            .collect();
        Self {
            keys: RwLock::new(keys),
        }
    }
}

impl KeyLookup for MemoryKeyStore {
    fn lookup(&self, kid: &str) -> Option<Arc<KeyMaterial>> {
        self.keys.read().get(kid).cloned()
    }

    fn add(&self, kid: &str, key: KeyMaterial) -> usize {
        let mut keys = self.keys.write();
        keys.insert(kid.to_string(), Arc::new(key));
        keys.len()
    }

    fn remove(&self, kid: &str) -> usize {
        let mut keys = self.keys.write();
        keys.remove(kid);
        keys.len()
    }

    fn key_ids(&self) -> Vec<String> {
        let mut kids: Vec<String> = self.keys.read().keys().cloned().collect();
        kids.sort();
        kids
    }

    fn len(&self) -> usize {
        self.keys.read().len()
    }
}

/// Key store loaded from a directory of PEM files.
///
/// Each `<kid>.pub.pem` provides a verification key; an optional sibling
/// `<kid>.pem` provides the signing key. The directory is read once in
/// [`FsKeyStore::open`]. Later [`KeyLookup::add`]/[`KeyLookup::remove`] calls
/// change the loaded set only and never touch the files.
#[derive(Debug)]
pub struct FsKeyStore {
    dir: PathBuf,
    keys: MemoryKeyStore,
}

impl FsKeyStore {
    /// Load every key pair found in `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::KeyLoad`] if the directory or a key file cannot be
    /// read or parsed, or if a private key has no public counterpart.
    pub fn open(dir: impl AsRef<Path>, algorithm: Algorithm) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        let names = list_file_names(&dir)?;

        let mut public_kids = BTreeSet::new();
        let mut private_kids = BTreeSet::new();
        for name in &names {
            if let Some(kid) = name.strip_suffix(PUBLIC_KEY_SUFFIX) {
                public_kids.insert(kid.to_string());
            } else if let Some(kid) = name.strip_suffix(PRIVATE_KEY_SUFFIX) {
                private_kids.insert(kid.to_string());
            }
        }

        if let Some(orphan) = private_kids.difference(&public_kids).next() {
            return Err(AuthError::KeyLoad {
                path: dir.join(format!("{orphan}{PRIVATE_KEY_SUFFIX}")).display().to_string(),
                reason: format!("missing public key {orphan}{PUBLIC_KEY_SUFFIX}"),
            });
        }

        let keys = MemoryKeyStore::new();
        for kid in &public_kids {
            let public_path = dir.join(format!("{kid}{PUBLIC_KEY_SUFFIX}"));
            let public_pem = read_key_file(&public_path)?;

            let parsed = if private_kids.contains(kid) {
                let private_path = dir.join(format!("{kid}{PRIVATE_KEY_SUFFIX}"));
                let private_pem = read_key_file(&private_path)?;
                KeyMaterial::from_pem(algorithm, &private_pem, &public_pem)
            } else {
                KeyMaterial::verify_only_from_pem(algorithm, &public_pem)
            };
            let material = parsed.map_err(|e| with_path(e, &dir.join(kid)))?;

            tracing::debug!(kid = %kid, can_sign = material.can_sign(), "Loaded key");
            keys.add(kid, material);
        }

        tracing::info!(dir = %dir.display(), count = keys.len(), "Key store loaded");
        Ok(Self { dir, keys })
    }

    /// The directory the keys were loaded from.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl KeyLookup for FsKeyStore {
    fn lookup(&self, kid: &str) -> Option<Arc<KeyMaterial>> {
        self.keys.lookup(kid)
    }

    fn add(&self, kid: &str, key: KeyMaterial) -> usize {
        self.keys.add(kid, key)
    }

    fn remove(&self, kid: &str) -> usize {
        self.keys.remove(kid)
    }

    fn key_ids(&self) -> Vec<String> {
        self.keys.key_ids()
    }

    fn len(&self) -> usize {
        self.keys.len()
    }
}

fn list_file_names(dir: &Path) -> Result<Vec<String>> {
    let entries = fs::read_dir(dir).map_err(|e| AuthError::KeyLoad {
        path: dir.display().to_string(),
        reason: e.to_string(),
    })?;

    let mut names = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| AuthError::KeyLoad {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;
        if entry.path().is_file() {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
    }
    Ok(names)
}

fn read_key_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| AuthError::KeyLoad {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}

fn with_path(err: AuthError, path: &Path) -> AuthError {
    match err {
        AuthError::KeyLoad { reason, .. } => AuthError::KeyLoad {
            path: path.display().to_string(),
            reason,
        },
        other => other,
    }
}
