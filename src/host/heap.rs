//! Embedded reference host - a compact slab object model
//!
//! Backs the pure-managed embedding mode and the test suite. This is the
//! smallest object model that satisfies the `HostObjectModel` seam; it is
//! not a CPython reimplementation and host-specific behavior stops at the
//! trait surface.

use parking_lot::{Mutex, RwLock};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use super::{BinaryOp, HostObjectModel, ManagedRef, ManagedValue};
use crate::exc::{PyException, PyResult};

/// Host-side builtin callable (no captured state).
pub type HostFn = fn(&EmbeddedHeap, &[ManagedRef]) -> PyResult<ManagedRef>;

/// Dict keys are resolved at insertion so lookups never chase handles.
#[derive(Debug, Clone, PartialEq)]
enum DictKey {
    Bool(bool),
    Int(i64),
    Str(String),
    /// Identity key for non-primitive objects.
    Ref(ManagedRef),
}

enum HostObject {
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    List(Vec<ManagedRef>),
    Tuple(Vec<ManagedRef>),
    Dict(Vec<(DictKey, ManagedRef)>),
    Type(String),
    Namespace {
        name: String,
        attrs: Vec<(String, ManagedRef)>,
    },
    Iterator {
        items: Vec<ManagedRef>,
        pos: usize,
    },
    Callable(HostFn),
    NativeHandle(usize),
}

impl HostObject {
    fn kind(&self) -> &'static str {
        match self {
            Self::None => "NoneType",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "str",
            Self::List(_) => "list",
            Self::Tuple(_) => "tuple",
            Self::Dict(_) => "dict",
            Self::Type(_) => "type",
            Self::Namespace { .. } => "namespace",
            Self::Iterator { .. } => "iterator",
            Self::Callable(_) => "builtin_function",
            Self::NativeHandle(_) => "native",
        }
    }
}

/// Slab heap of managed objects. Handles are never reused; "collection" is
/// modeled by dropping native-side pins (see `retain`/`release`).
pub struct EmbeddedHeap {
    objects: RwLock<Vec<HostObject>>,
    interned_types: Mutex<HashMap<String, ManagedRef>>,
    pins: Mutex<HashMap<ManagedRef, usize>>,
}

impl EmbeddedHeap {
    pub fn new() -> Self {
        // Slot 0 is the None singleton, 1/2 the interned booleans.
        let objects = vec![HostObject::None, HostObject::Bool(true), HostObject::Bool(false)];
        Self {
            objects: RwLock::new(objects),
            interned_types: Mutex::new(HashMap::new()),
            pins: Mutex::new(HashMap::new()),
        }
    }

    fn alloc(&self, obj: HostObject) -> ManagedRef {
        let mut objects = self.objects.write();
        objects.push(obj);
        ManagedRef::from_raw(objects.len() as u64)
    }

    fn index(r: ManagedRef) -> PyResult<usize> {
        let raw = r.raw();
        if raw == 0 {
            return Err(PyException::system("dangling managed reference"));
        }
        Ok((raw - 1) as usize)
    }

    /// Interned type object for a kind name.
    pub fn type_object(&self, name: &str) -> ManagedRef {
        let mut interned = self.interned_types.lock();
        if let Some(r) = interned.get(name) {
            return *r;
        }
        let r = self.alloc(HostObject::Type(name.to_string()));
        interned.insert(name.to_string(), r);
        r
    }

    /// Namespace object with mutable attributes (attribute-protocol target).
    pub fn new_namespace(&self, name: &str) -> ManagedRef {
        self.alloc(HostObject::Namespace {
            name: name.to_string(),
            attrs: Vec::new(),
        })
    }

    /// Host-side builtin callable.
    pub fn new_callable(&self, f: HostFn) -> ManagedRef {
        self.alloc(HostObject::Callable(f))
    }

    /// Resolve a managed value to a dict key, dereferencing primitive
    /// objects so `d[box_int(1)]` and `d[Int(1)]` agree.
    fn key_of(&self, key: &ManagedValue) -> PyResult<DictKey> {
        match key {
            ManagedValue::Bool(b) => Ok(DictKey::Bool(*b)),
            ManagedValue::Int(v) => Ok(DictKey::Int(*v)),
            ManagedValue::UInt(v) => i64::try_from(*v)
                .map(DictKey::Int)
                .map_err(|_| PyException::overflow("key out of i64 range")),
            ManagedValue::Str(s) => Ok(DictKey::Str(s.clone())),
            ManagedValue::Object(r) => {
                let objects = self.objects.read();
                match objects.get(Self::index(*r)?) {
                    Some(HostObject::Bool(b)) => Ok(DictKey::Bool(*b)),
                    Some(HostObject::Int(v)) => Ok(DictKey::Int(*v)),
                    Some(HostObject::Str(s)) => Ok(DictKey::Str(s.clone())),
                    Some(_) => Ok(DictKey::Ref(*r)),
                    None => Err(PyException::system("dangling managed reference")),
                }
            }
            ManagedValue::NoValue => Err(PyException::system("null key passed to C-API call")),
            other => Err(PyException::type_error(format!("unhashable key: {other:?}"))),
        }
    }

    fn repr_inner(objects: &[HostObject], r: ManagedRef, depth: usize) -> String {
        if depth > 8 {
            return "...".to_string();
        }
        let Ok(idx) = Self::index(r) else {
            return "<invalid>".to_string();
        };
        match objects.get(idx) {
            None => "<invalid>".to_string(),
            Some(HostObject::None) => "None".to_string(),
            Some(HostObject::Bool(true)) => "True".to_string(),
            Some(HostObject::Bool(false)) => "False".to_string(),
            Some(HostObject::Int(v)) => v.to_string(),
            Some(HostObject::Float(v)) => format!("{v:?}"),
            Some(HostObject::Str(s)) => format!("'{s}'"),
            Some(HostObject::List(items)) => {
                let parts: Vec<_> = items
                    .iter()
                    .map(|i| Self::repr_inner(objects, *i, depth + 1))
                    .collect();
                format!("[{}]", parts.join(", "))
            }
            Some(HostObject::Tuple(items)) => {
                let parts: Vec<_> = items
                    .iter()
                    .map(|i| Self::repr_inner(objects, *i, depth + 1))
                    .collect();
                format!("({})", parts.join(", "))
            }
            Some(HostObject::Dict(entries)) => {
                let parts: Vec<_> = entries
                    .iter()
                    .map(|(k, v)| {
                        let key = match k {
                            DictKey::Bool(true) => "True".to_string(),
                            DictKey::Bool(false) => "False".to_string(),
                            DictKey::Int(i) => i.to_string(),
                            DictKey::Str(s) => format!("'{s}'"),
                            DictKey::Ref(r) => Self::repr_inner(objects, *r, depth + 1),
                        };
                        format!("{key}: {}", Self::repr_inner(objects, *v, depth + 1))
                    })
                    .collect();
                format!("{{{}}}", parts.join(", "))
            }
            Some(HostObject::Type(name)) => format!("<class '{name}'>"),
            Some(HostObject::Namespace { name, .. }) => format!("<namespace '{name}'>"),
            Some(HostObject::Iterator { .. }) => "<iterator>".to_string(),
            Some(HostObject::Callable(_)) => "<built-in function>".to_string(),
            Some(HostObject::NativeHandle(a)) => format!("<native object at {a:#x}>"),
        }
    }

    /// Numeric view for the number protocol.
    fn numeric(&self, r: ManagedRef, op: BinaryOp) -> PyResult<Num> {
        let objects = self.objects.read();
        match objects.get(Self::index(r)?) {
            Some(HostObject::Int(v)) => Ok(Num::Int(*v)),
            Some(HostObject::Bool(b)) => Ok(Num::Int(*b as i64)),
            Some(HostObject::Float(v)) => Ok(Num::Float(*v)),
            Some(obj) => Err(PyException::type_error(format!(
                "unsupported operand type(s) for {}: '{}'",
                op.symbol(),
                obj.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }
}

impl Default for EmbeddedHeap {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Clone, Copy)]
enum Num {
    Int(i64),
    Float(f64),
}

/// Python floor-division semantics for integers.
fn floor_div(a: i64, b: i64) -> PyResult<i64> {
    if b == 0 {
        return Err(PyException::zero_division("integer division or modulo by zero"));
    }
    let q = a / b;
    if a % b != 0 && (a < 0) != (b < 0) {
        Ok(q - 1)
    } else {
        Ok(q)
    }
}

/// Python modulo semantics: the result takes the sign of the divisor.
fn py_mod(a: i64, b: i64) -> PyResult<i64> {
    if b == 0 {
        return Err(PyException::zero_division("integer division or modulo by zero"));
    }
    let r = a % b;
    if r != 0 && (r < 0) != (b < 0) {
        Ok(r + b)
    } else {
        Ok(r)
    }
}

impl HostObjectModel for EmbeddedHeap {
    fn none(&self) -> ManagedRef {
        ManagedRef::from_raw(1)
    }

    fn type_of(&self, obj: ManagedRef) -> PyResult<ManagedRef> {
        let kind = {
            let objects = self.objects.read();
            objects
                .get(Self::index(obj)?)
                .ok_or_else(|| PyException::system("dangling managed reference"))?
                .kind()
        };
        Ok(self.type_object(kind))
    }

    fn get_item(&self, obj: ManagedRef, key: &ManagedValue) -> PyResult<ManagedRef> {
        let key = self.key_of(key)?;
        enum Out {
            Ready(ManagedRef),
            CharStr(char),
        }

        let out = {
            let objects = self.objects.read();
            let host = objects
                .get(Self::index(obj)?)
                .ok_or_else(|| PyException::system("dangling managed reference"))?;
            match host {
                HostObject::List(items) | HostObject::Tuple(items) => {
                    let idx = sequence_index(&key, items.len(), host.kind())?;
                    Out::Ready(items[idx])
                }
                HostObject::Str(s) => {
                    let chars: Vec<char> = s.chars().collect();
                    let idx = sequence_index(&key, chars.len(), "str")?;
                    Out::CharStr(chars[idx])
                }
                HostObject::Dict(entries) => {
                    let found = entries.iter().find(|(k, _)| *k == key);
                    match found {
                        Some((_, v)) => Out::Ready(*v),
                        None => return Err(PyException::key_error(format!("{key:?}"))),
                    }
                }
                other => {
                    return Err(PyException::type_error(format!(
                        "'{}' object is not subscriptable",
                        other.kind()
                    )))
                }
            }
        };

        match out {
            Out::Ready(r) => Ok(r),
            Out::CharStr(c) => Ok(self.alloc(HostObject::Str(c.to_string()))),
        }
    }

    fn set_item(&self, obj: ManagedRef, key: &ManagedValue, value: ManagedRef) -> PyResult<()> {
        let key = self.key_of(key)?;
        let mut objects = self.objects.write();
        let idx = Self::index(obj)?;
        let kind = objects
            .get(idx)
            .ok_or_else(|| PyException::system("dangling managed reference"))?
            .kind();
        match objects.get_mut(idx) {
            Some(HostObject::List(items)) => {
                let i = sequence_index(&key, items.len(), kind)?;
                items[i] = value;
                Ok(())
            }
            Some(HostObject::Dict(entries)) => {
                if let Some(slot) = entries.iter_mut().find(|(k, _)| *k == key) {
                    slot.1 = value;
                } else {
                    entries.push((key, value));
                }
                Ok(())
            }
            Some(HostObject::Tuple(_)) => Err(PyException::type_error(
                "'tuple' object does not support item assignment",
            )),
            Some(other) => Err(PyException::type_error(format!(
                "'{}' object does not support item assignment",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn get_attr(&self, obj: ManagedRef, name: &str) -> PyResult<ManagedRef> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::Namespace { name: ns, attrs }) => attrs
                .iter()
                .find(|(a, _)| a == name)
                .map(|(_, v)| *v)
                .ok_or_else(|| {
                    PyException::attribute_error(format!(
                        "namespace '{ns}' has no attribute '{name}'"
                    ))
                }),
            Some(other) => Err(PyException::attribute_error(format!(
                "'{}' object has no attribute '{name}'",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn set_attr(&self, obj: ManagedRef, name: &str, value: ManagedRef) -> PyResult<()> {
        let mut objects = self.objects.write();
        match objects.get_mut(Self::index(obj)?) {
            Some(HostObject::Namespace { attrs, .. }) => {
                if let Some(slot) = attrs.iter_mut().find(|(a, _)| a == name) {
                    slot.1 = value;
                } else {
                    attrs.push((name.to_string(), value));
                }
                Ok(())
            }
            Some(other) => Err(PyException::attribute_error(format!(
                "'{}' object attributes are read-only",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn call(&self, callable: ManagedRef, args: &[ManagedRef]) -> PyResult<ManagedRef> {
        let f = {
            let objects = self.objects.read();
            match objects.get(Self::index(callable)?) {
                Some(HostObject::Callable(f)) => *f,
                Some(other) => {
                    return Err(PyException::type_error(format!(
                        "'{}' object is not callable",
                        other.kind()
                    )))
                }
                None => return Err(PyException::system("dangling managed reference")),
            }
        };
        f(self, args)
    }

    fn length(&self, obj: ManagedRef) -> PyResult<usize> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::Str(s)) => Ok(s.chars().count()),
            Some(HostObject::List(items)) | Some(HostObject::Tuple(items)) => Ok(items.len()),
            Some(HostObject::Dict(entries)) => Ok(entries.len()),
            Some(other) => Err(PyException::type_error(format!(
                "object of type '{}' has no len()",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn truth(&self, obj: ManagedRef) -> PyResult<bool> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::None) => Ok(false),
            Some(HostObject::Bool(b)) => Ok(*b),
            Some(HostObject::Int(v)) => Ok(*v != 0),
            Some(HostObject::Float(v)) => Ok(*v != 0.0),
            Some(HostObject::Str(s)) => Ok(!s.is_empty()),
            Some(HostObject::List(items)) | Some(HostObject::Tuple(items)) => Ok(!items.is_empty()),
            Some(HostObject::Dict(entries)) => Ok(!entries.is_empty()),
            Some(_) => Ok(true),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn str_of(&self, obj: ManagedRef) -> PyResult<String> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::Str(s)) => Ok(s.clone()),
            Some(_) => Ok(Self::repr_inner(&objects, obj, 0)),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn repr_of(&self, obj: ManagedRef) -> PyResult<String> {
        let objects = self.objects.read();
        if objects.get(Self::index(obj)?).is_none() {
            return Err(PyException::system("dangling managed reference"));
        }
        Ok(Self::repr_inner(&objects, obj, 0))
    }

    fn hash_of(&self, obj: ManagedRef) -> PyResult<u64> {
        let objects = self.objects.read();
        let mut hasher = DefaultHasher::new();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::None) => 0u8.hash(&mut hasher),
            Some(HostObject::Bool(b)) => (1u8, b).hash(&mut hasher),
            Some(HostObject::Int(v)) => (2u8, v).hash(&mut hasher),
            Some(HostObject::Float(v)) => (3u8, v.to_bits()).hash(&mut hasher),
            Some(HostObject::Str(s)) => (4u8, s).hash(&mut hasher),
            Some(HostObject::Type(name)) => (5u8, name).hash(&mut hasher),
            Some(HostObject::NativeHandle(a)) => (6u8, a).hash(&mut hasher),
            Some(HostObject::Tuple(_)) | Some(HostObject::Callable(_)) => {
                (7u8, obj.raw()).hash(&mut hasher)
            }
            Some(other) => {
                return Err(PyException::type_error(format!(
                    "unhashable type: '{}'",
                    other.kind()
                )))
            }
            None => return Err(PyException::system("dangling managed reference")),
        }
        Ok(hasher.finish())
    }

    fn iterate(&self, obj: ManagedRef) -> PyResult<ManagedRef> {
        enum Src {
            Ready(Vec<ManagedRef>),
            Chars(Vec<char>),
            Keys(Vec<DictKey>),
        }

        let src = {
            let objects = self.objects.read();
            match objects.get(Self::index(obj)?) {
                Some(HostObject::List(items)) | Some(HostObject::Tuple(items)) => {
                    Src::Ready(items.clone())
                }
                Some(HostObject::Str(s)) => Src::Chars(s.chars().collect()),
                Some(HostObject::Dict(entries)) => {
                    Src::Keys(entries.iter().map(|(k, _)| k.clone()).collect())
                }
                Some(other) => {
                    return Err(PyException::type_error(format!(
                        "'{}' object is not iterable",
                        other.kind()
                    )))
                }
                None => return Err(PyException::system("dangling managed reference")),
            }
        };

        let items = match src {
            Src::Ready(items) => items,
            Src::Chars(chars) => chars
                .into_iter()
                .map(|c| self.alloc(HostObject::Str(c.to_string())))
                .collect(),
            Src::Keys(keys) => keys
                .into_iter()
                .map(|k| match k {
                    DictKey::Bool(b) => self.box_bool(b),
                    DictKey::Int(v) => self.box_int(v),
                    DictKey::Str(s) => self.box_str(&s),
                    DictKey::Ref(r) => r,
                })
                .collect(),
        };

        Ok(self.alloc(HostObject::Iterator { items, pos: 0 }))
    }

    fn iterate_next(&self, iterator: ManagedRef) -> PyResult<Option<ManagedRef>> {
        let mut objects = self.objects.write();
        match objects.get_mut(Self::index(iterator)?) {
            Some(HostObject::Iterator { items, pos }) => {
                if *pos < items.len() {
                    let r = items[*pos];
                    *pos += 1;
                    Ok(Some(r))
                } else {
                    Ok(None)
                }
            }
            Some(other) => Err(PyException::type_error(format!(
                "'{}' object is not an iterator",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn is_instance(&self, obj: ManagedRef, ty: ManagedRef) -> PyResult<bool> {
        {
            let objects = self.objects.read();
            match objects.get(Self::index(ty)?) {
                Some(HostObject::Type(_)) => {}
                Some(other) => {
                    return Err(PyException::type_error(format!(
                        "isinstance() arg 2 must be a type, not '{}'",
                        other.kind()
                    )))
                }
                None => return Err(PyException::system("dangling managed reference")),
            }
        }
        Ok(self.type_of(obj)? == ty)
    }

    fn contains(&self, obj: ManagedRef, item: &ManagedValue) -> PyResult<bool> {
        let key = self.key_of(item)?;
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::List(items)) | Some(HostObject::Tuple(items)) => {
                for r in items {
                    let elem_key = match objects.get(Self::index(*r)?) {
                        Some(HostObject::Bool(b)) => DictKey::Bool(*b),
                        Some(HostObject::Int(v)) => DictKey::Int(*v),
                        Some(HostObject::Str(s)) => DictKey::Str(s.clone()),
                        _ => DictKey::Ref(*r),
                    };
                    if elem_key == key {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Some(HostObject::Dict(entries)) => Ok(entries.iter().any(|(k, _)| *k == key)),
            Some(HostObject::Str(s)) => match key {
                DictKey::Str(needle) => Ok(s.contains(&needle)),
                _ => Err(PyException::type_error(
                    "'in <string>' requires string as left operand",
                )),
            },
            Some(other) => Err(PyException::type_error(format!(
                "argument of type '{}' is not a container",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn concat(&self, a: ManagedRef, b: ManagedRef) -> PyResult<ManagedRef> {
        enum Out {
            Str(String),
            List(Vec<ManagedRef>),
            Tuple(Vec<ManagedRef>),
        }
        let out = {
            let objects = self.objects.read();
            let left = objects
                .get(Self::index(a)?)
                .ok_or_else(|| PyException::system("dangling managed reference"))?;
            let right = objects
                .get(Self::index(b)?)
                .ok_or_else(|| PyException::system("dangling managed reference"))?;
            match (left, right) {
                (HostObject::Str(x), HostObject::Str(y)) => Out::Str(format!("{x}{y}")),
                (HostObject::List(x), HostObject::List(y)) => {
                    Out::List(x.iter().chain(y.iter()).copied().collect())
                }
                (HostObject::Tuple(x), HostObject::Tuple(y)) => {
                    Out::Tuple(x.iter().chain(y.iter()).copied().collect())
                }
                (l, r) => {
                    return Err(PyException::type_error(format!(
                        "cannot concatenate '{}' and '{}'",
                        l.kind(),
                        r.kind()
                    )))
                }
            }
        };
        Ok(match out {
            Out::Str(s) => self.alloc(HostObject::Str(s)),
            Out::List(items) => self.alloc(HostObject::List(items)),
            Out::Tuple(items) => self.alloc(HostObject::Tuple(items)),
        })
    }

    fn sequence_items(&self, obj: ManagedRef) -> PyResult<Vec<ManagedRef>> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::List(items)) | Some(HostObject::Tuple(items)) => Ok(items.clone()),
            Some(other) => Err(PyException::type_error(format!(
                "expected sequence, got '{}'",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn number_binary(&self, op: BinaryOp, a: ManagedRef, b: ManagedRef) -> PyResult<ManagedRef> {
        // Non-numeric special cases first: concatenation and repetition.
        {
            let objects = self.objects.read();
            let left = objects.get(Self::index(a)?);
            let right = objects.get(Self::index(b)?);
            match (op, left, right) {
                (BinaryOp::Add, Some(HostObject::Str(_)), Some(HostObject::Str(_)))
                | (BinaryOp::Add, Some(HostObject::List(_)), Some(HostObject::List(_)))
                | (BinaryOp::Add, Some(HostObject::Tuple(_)), Some(HostObject::Tuple(_))) => {
                    drop(objects);
                    return self.concat(a, b);
                }
                (BinaryOp::Mul, Some(HostObject::Str(s)), Some(HostObject::Int(n)))
                | (BinaryOp::Mul, Some(HostObject::Int(n)), Some(HostObject::Str(s))) => {
                    let out = s.repeat((*n).max(0) as usize);
                    drop(objects);
                    return Ok(self.alloc(HostObject::Str(out)));
                }
                (BinaryOp::Mul, Some(HostObject::List(items)), Some(HostObject::Int(n)))
                | (BinaryOp::Mul, Some(HostObject::Int(n)), Some(HostObject::List(items))) => {
                    let mut out = Vec::new();
                    for _ in 0..(*n).max(0) {
                        out.extend_from_slice(items);
                    }
                    drop(objects);
                    return Ok(self.alloc(HostObject::List(out)));
                }
                _ => {}
            }
        }

        let left = self.numeric(a, op)?;
        let right = self.numeric(b, op)?;

        let result = match (left, right) {
            (Num::Int(x), Num::Int(y)) => match op {
                BinaryOp::Add => Num::Int(
                    x.checked_add(y)
                        .ok_or_else(|| PyException::overflow("integer addition overflow"))?,
                ),
                BinaryOp::Sub => Num::Int(
                    x.checked_sub(y)
                        .ok_or_else(|| PyException::overflow("integer subtraction overflow"))?,
                ),
                BinaryOp::Mul => Num::Int(
                    x.checked_mul(y)
                        .ok_or_else(|| PyException::overflow("integer multiplication overflow"))?,
                ),
                BinaryOp::TrueDiv => {
                    if y == 0 {
                        return Err(PyException::zero_division("division by zero"));
                    }
                    Num::Float(x as f64 / y as f64)
                }
                BinaryOp::FloorDiv => Num::Int(floor_div(x, y)?),
                BinaryOp::Rem => Num::Int(py_mod(x, y)?),
            },
            (x, y) => {
                let (x, y) = (as_f64(x), as_f64(y));
                match op {
                    BinaryOp::Add => Num::Float(x + y),
                    BinaryOp::Sub => Num::Float(x - y),
                    BinaryOp::Mul => Num::Float(x * y),
                    BinaryOp::TrueDiv => {
                        if y == 0.0 {
                            return Err(PyException::zero_division("float division by zero"));
                        }
                        Num::Float(x / y)
                    }
                    BinaryOp::FloorDiv => {
                        if y == 0.0 {
                            return Err(PyException::zero_division("float floor division by zero"));
                        }
                        Num::Float((x / y).floor())
                    }
                    BinaryOp::Rem => {
                        if y == 0.0 {
                            return Err(PyException::zero_division("float modulo"));
                        }
                        let r = x % y;
                        Num::Float(if r != 0.0 && (r < 0.0) != (y < 0.0) { r + y } else { r })
                    }
                }
            }
        };

        Ok(match result {
            Num::Int(v) => self.box_int(v),
            Num::Float(v) => self.box_float(v),
        })
    }

    fn index_of(&self, obj: ManagedRef) -> PyResult<i64> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::Int(v)) => Ok(*v),
            Some(HostObject::Bool(b)) => Ok(*b as i64),
            Some(other) => Err(PyException::type_error(format!(
                "'{}' object cannot be interpreted as an integer",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn int_value(&self, obj: ManagedRef) -> PyResult<i64> {
        self.index_of(obj)
    }

    fn float_value(&self, obj: ManagedRef) -> PyResult<f64> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj)?) {
            Some(HostObject::Float(v)) => Ok(*v),
            Some(HostObject::Int(v)) => Ok(*v as f64),
            Some(HostObject::Bool(b)) => Ok(*b as i64 as f64),
            Some(other) => Err(PyException::type_error(format!(
                "must be real number, not '{}'",
                other.kind()
            ))),
            None => Err(PyException::system("dangling managed reference")),
        }
    }

    fn box_int(&self, v: i64) -> ManagedRef {
        self.alloc(HostObject::Int(v))
    }

    fn box_float(&self, v: f64) -> ManagedRef {
        self.alloc(HostObject::Float(v))
    }

    fn box_bool(&self, v: bool) -> ManagedRef {
        // Interned at slots 1 and 2.
        ManagedRef::from_raw(if v { 2 } else { 3 })
    }

    fn box_str(&self, s: &str) -> ManagedRef {
        self.alloc(HostObject::Str(s.to_string()))
    }

    fn new_list(&self, items: &[ManagedRef]) -> ManagedRef {
        self.alloc(HostObject::List(items.to_vec()))
    }

    fn new_tuple(&self, items: &[ManagedRef]) -> ManagedRef {
        self.alloc(HostObject::Tuple(items.to_vec()))
    }

    fn new_dict(&self) -> ManagedRef {
        self.alloc(HostObject::Dict(Vec::new()))
    }

    fn adopt_native(&self, address: usize) -> ManagedRef {
        self.alloc(HostObject::NativeHandle(address))
    }

    fn native_address(&self, obj: ManagedRef) -> Option<usize> {
        let objects = self.objects.read();
        match objects.get(Self::index(obj).ok()?) {
            Some(HostObject::NativeHandle(a)) => Some(*a),
            _ => None,
        }
    }

    fn retain(&self, obj: ManagedRef) {
        *self.pins.lock().entry(obj).or_insert(0) += 1;
    }

    fn release(&self, obj: ManagedRef) {
        let mut pins = self.pins.lock();
        if let Some(count) = pins.get_mut(&obj) {
            *count -= 1;
            if *count == 0 {
                pins.remove(&obj);
            }
        }
    }

    fn is_pinned(&self, obj: ManagedRef) -> bool {
        self.pins.lock().contains_key(&obj)
    }
}

/// Normalize a sequence index, supporting negative indexing.
fn sequence_index(key: &DictKey, len: usize, kind: &str) -> PyResult<usize> {
    let raw = match key {
        DictKey::Int(v) => *v,
        DictKey::Bool(b) => *b as i64,
        _ => {
            return Err(PyException::type_error(format!(
                "{kind} indices must be integers"
            )))
        }
    };
    let idx = if raw < 0 { raw + len as i64 } else { raw };
    if idx < 0 || idx as usize >= len {
        return Err(PyException::index_error(format!("{kind} index out of range")));
    }
    Ok(idx as usize)
}

fn as_f64(n: Num) -> f64 {
    match n {
        Num::Int(v) => v as f64,
        Num::Float(v) => v,
    }
}
