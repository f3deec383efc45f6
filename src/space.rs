//! The process symbol space and the loading primitives over it.
//!
//! A [`SymbolSpace`] is the table of types resident in the process. Binding
//! into it happens through explicit capability values: the [`RootDefiner`]
//! granted once at process start, a [`NamespaceDefiner`] scoped to a single
//! namespace, or an [`IsolatedLoader`] that keeps its types out of the table
//! entirely and sees only the public surface of resident types.
//!
//! The visibility a type was bound with is recorded on the type as an
//! [`Access`] value and checked on every private member call.

use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock, Weak};

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::error::{KilnError, RuntimeError};
use crate::image::{MethodImage, TypeImage, Value, Visibility};
use crate::vm;

/// Visibility capability recorded on a loaded type at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// The same visibility into `namespace` as code that lives there,
    /// including private members of its types.
    Privileged(String),
    /// Public surface only.
    Public,
}

impl Access {
    pub(crate) fn permits_private(&self, namespace: &str) -> bool {
        matches!(self, Access::Privileged(ns) if ns == namespace)
    }
}

/// A type bound into the process, ready to execute.
pub struct LoadedType {
    name: String,
    namespace: String,
    access: Access,
    methods: FxHashMap<String, MethodImage>,
    resolver: Resolver,
}

impl LoadedType {
    fn from_image(image: TypeImage, access: Access, resolver: Resolver) -> LoadedType {
        let namespace = image.namespace().to_string();
        let mut methods = FxHashMap::default();
        for method in image.methods {
            methods.insert(method.name.clone(), method);
        }
        LoadedType {
            name: image.name,
            namespace,
            access,
            methods,
            resolver,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The capability this type was bound with.
    pub fn access(&self) -> &Access {
        &self.access
    }

    pub(crate) fn method(&self, name: &str) -> Option<&MethodImage> {
        self.methods.get(name)
    }

    /// Names of the publicly visible members.
    pub fn members(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .methods
            .values()
            .filter(|m| m.visibility == Visibility::Public)
            .map(|m| m.name.as_str())
            .collect();
        names.sort_unstable();
        names
    }

    /// Resolve a type name through the loader this type was defined by.
    pub(crate) fn resolve(&self, name: &str) -> Result<Arc<LoadedType>, RuntimeError> {
        self.resolver.resolve(name)
    }
}

impl fmt::Debug for LoadedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedType")
            .field("name", &self.name)
            .field("access", &self.access)
            .finish()
    }
}

/// How a loaded type resolves names while its code runs. Weak so that a
/// dropped isolated loader does not keep itself alive through its own types.
enum Resolver {
    Space(Weak<SpaceInner>),
    Isolated(Weak<IsolatedInner>),
}

impl Resolver {
    fn resolve(&self, name: &str) -> Result<Arc<LoadedType>, RuntimeError> {
        match self {
            Resolver::Space(weak) => {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| RuntimeError::LoaderUnloaded(name.to_string()))?;
                SymbolSpace { inner }
                    .lookup(name)
                    .ok_or_else(|| RuntimeError::UnknownType(name.to_string()))
            }
            Resolver::Isolated(weak) => {
                let inner = weak
                    .upgrade()
                    .ok_or_else(|| RuntimeError::LoaderUnloaded(name.to_string()))?;
                IsolatedLoader { inner }
                    .lookup(name)
                    .map_err(|e| RuntimeError::Malformed(e.to_string()))?
                    .ok_or_else(|| RuntimeError::UnknownType(name.to_string()))
            }
        }
    }
}

struct SpaceInner {
    types: RwLock<FxHashMap<String, Arc<LoadedType>>>,
    resource_roots: RwLock<Vec<PathBuf>>,
    root_granted: AtomicBool,
}

/// The set of types resident in the process, plus the file-backed resource
/// roots attached to its loading mechanism.
///
/// Cloning produces another handle to the same space. [`SymbolSpace::global`]
/// is the space the public entry points bind into; private spaces exist for
/// embedding and tests.
#[derive(Clone)]
pub struct SymbolSpace {
    inner: Arc<SpaceInner>,
}

impl SymbolSpace {
    pub fn new() -> Self {
        SymbolSpace {
            inner: Arc::new(SpaceInner {
                types: RwLock::new(FxHashMap::default()),
                resource_roots: RwLock::new(Vec::new()),
                root_granted: AtomicBool::new(false),
            }),
        }
    }

    /// The process-wide symbol space.
    pub fn global() -> &'static SymbolSpace {
        static GLOBAL: OnceLock<SymbolSpace> = OnceLock::new();
        GLOBAL.get_or_init(SymbolSpace::new)
    }

    /// Look up an already-resident type by qualified name.
    pub fn lookup(&self, name: &str) -> Option<Arc<LoadedType>> {
        self.inner
            .types
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    /// Bind a type image into the space under the given capability.
    ///
    /// A name that is already resident is a duplicate-definition fault.
    pub fn define(&self, image: TypeImage, access: Access) -> Result<Arc<LoadedType>, KilnError> {
        let name = image.name.clone();
        debug!(name = %name, access = ?access, "defining type");
        let ty = Arc::new(LoadedType::from_image(
            image,
            access,
            Resolver::Space(Arc::downgrade(&self.inner)),
        ));
        let mut types = self
            .inner
            .types
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if types.contains_key(&name) {
            return Err(KilnError::Loading {
                name,
                reason: "a type under this name is already resident".to_string(),
            });
        }
        types.insert(name, Arc::clone(&ty));
        Ok(ty)
    }

    /// Grant this space's general-purpose privileged definer. Meant to be
    /// called once at process start; the grant is sticky.
    pub fn grant_root_definer(&self) {
        self.inner.root_granted.store(true, Ordering::Release);
    }

    /// The general-purpose privileged definer, if it was granted.
    pub fn root_definer(&self) -> Option<RootDefiner> {
        if self.inner.root_granted.load(Ordering::Acquire) {
            Some(RootDefiner {
                space: self.clone(),
            })
        } else {
            None
        }
    }

    /// A privileged definer scoped to one namespace: the explicit capability
    /// token for "bind with the visibility of namespace N".
    pub fn privileged_definer(&self, namespace: &str) -> NamespaceDefiner {
        NamespaceDefiner {
            space: self.clone(),
            namespace: namespace.to_string(),
        }
    }

    /// Attach a file-backed resource root to this space's loading mechanism.
    /// Roots feed search-path assembly; nothing is read from them here.
    pub fn attach_resource_root(&self, root: impl Into<PathBuf>) {
        self.inner
            .resource_roots
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(root.into());
    }

    pub fn resource_roots(&self) -> Vec<PathBuf> {
        self.inner
            .resource_roots
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Default for SymbolSpace {
    fn default() -> Self {
        SymbolSpace::new()
    }
}

/// General-purpose privileged definer. Defines each type with privileged
/// visibility in its own namespace.
pub struct RootDefiner {
    space: SymbolSpace,
}

impl RootDefiner {
    pub fn define(&self, image: TypeImage) -> Result<Arc<LoadedType>, KilnError> {
        let access = Access::Privileged(image.namespace().to_string());
        self.space.define(image, access)
    }
}

/// Privileged definer scoped to a single namespace. Rejects artifacts that
/// live outside it; privileged visibility does not extend past the namespace
/// it was granted for.
pub struct NamespaceDefiner {
    space: SymbolSpace,
    namespace: String,
}

impl NamespaceDefiner {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn define(&self, image: TypeImage) -> Result<Arc<LoadedType>, KilnError> {
        if image.namespace() != self.namespace {
            return Err(KilnError::Loading {
                name: image.name,
                reason: format!(
                    "artifact is outside the privileged namespace {}",
                    self.namespace
                ),
            });
        }
        self.space
            .define(image, Access::Privileged(self.namespace.clone()))
    }
}

struct IsolatedInner {
    parent: SymbolSpace,
    images: FxHashMap<String, Vec<u8>>,
    defined: RwLock<FxHashMap<String, Arc<LoadedType>>>,
}

/// A fresh loading unit backed by an artifact mapping, parented to a symbol
/// space. Types defined here never enter the parent's table, are defined
/// lazily on first lookup, and carry public-only visibility.
#[derive(Clone)]
pub struct IsolatedLoader {
    inner: Arc<IsolatedInner>,
}

impl IsolatedLoader {
    pub fn new(parent: SymbolSpace, images: FxHashMap<String, Vec<u8>>) -> Self {
        IsolatedLoader {
            inner: Arc::new(IsolatedInner {
                parent,
                images,
                defined: RwLock::new(FxHashMap::default()),
            }),
        }
    }

    /// Resolve a name: types defined here first, then this loader's own
    /// artifact mapping, then the parent space.
    pub fn lookup(&self, name: &str) -> Result<Option<Arc<LoadedType>>, KilnError> {
        if let Some(ty) = self
            .inner
            .defined
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Ok(Some(Arc::clone(ty)));
        }
        if let Some(bytes) = self.inner.images.get(name) {
            let image = TypeImage::from_bytes(bytes).map_err(|e| KilnError::Loading {
                name: name.to_string(),
                reason: format!("malformed type image: {}", e),
            })?;
            let ty = Arc::new(LoadedType::from_image(
                image,
                Access::Public,
                Resolver::Isolated(Arc::downgrade(&self.inner)),
            ));
            let mut defined = self
                .inner
                .defined
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            let ty = defined
                .entry(name.to_string())
                .or_insert(ty)
                .clone();
            return Ok(Some(ty));
        }
        Ok(self.inner.parent.lookup(name))
    }
}

/// The terminal output of a compilation: an invocable, process-resident
/// representation of the primary unit.
///
/// Holds its isolated loader alive when one was used, so types loaded via
/// the fallback strategy last as long as some handle to them does.
pub struct ResolvedType {
    ty: Arc<LoadedType>,
    #[allow(dead_code)]
    space: SymbolSpace,
    isolated: Option<IsolatedLoader>,
}

impl ResolvedType {
    pub(crate) fn resident(ty: Arc<LoadedType>, space: SymbolSpace) -> Self {
        ResolvedType {
            ty,
            space,
            isolated: None,
        }
    }

    pub(crate) fn isolated(ty: Arc<LoadedType>, space: SymbolSpace, loader: IsolatedLoader) -> Self {
        ResolvedType {
            ty,
            space,
            isolated: Some(loader),
        }
    }

    pub fn name(&self) -> &str {
        self.ty.name()
    }

    pub fn access(&self) -> &Access {
        self.ty.access()
    }

    /// True when this type was bound through the isolated fallback loader.
    pub fn is_isolated(&self) -> bool {
        self.isolated.is_some()
    }

    /// Names of the publicly visible members.
    pub fn members(&self) -> Vec<&str> {
        self.ty.members()
    }

    /// Invoke a public method. Host callers see only the public surface;
    /// private members are reachable solely from code with the right
    /// capability.
    pub fn invoke(&self, member: &str, args: &[Value]) -> Result<Value, RuntimeError> {
        let method = self
            .ty
            .method(member)
            .ok_or_else(|| RuntimeError::UnknownMember {
                type_name: self.ty.name().to_string(),
                member: member.to_string(),
            })?;
        if method.visibility == Visibility::Private {
            return Err(RuntimeError::PrivateMember {
                type_name: self.ty.name().to_string(),
                member: member.to_string(),
            });
        }
        vm::execute(&self.ty, method, args, 0)
    }
}

impl fmt::Debug for ResolvedType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedType")
            .field("name", &self.ty.name())
            .field("access", self.ty.access())
            .field("isolated", &self.is_isolated())
            .finish()
    }
}
