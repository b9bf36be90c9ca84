//! # Field Resolution
//!
//! Turns a structure's declared fields into the ordered [`RecordDescriptor`]
//! the codec walks for every encode and decode of that type.
//!
//! Declarations come from [`Structure::declare`], normally generated by
//! [`ua_struct!`](crate::ua_struct). Resolution is depth-first and keeps
//! declaration order:
//!
//! - private fields are skipped and never reach the wire
//! - embedded structures are resolved recursively and spliced in place
//! - every other field gets its tag parsed into a [`FieldDescriptor`]
//!
//! A tag failure is wrapped with the immediate field name and aborts the whole
//! resolution; no partial descriptor is returned.
//!
//! Sibling links (`lengthField`, `switchField`) are resolved to indices once
//! when the record is built. A name that matches nothing stays unresolved and
//! fails when the codec reaches that field.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::core::codec::Encodable;
use crate::core::tag::{parse_tag, FieldTag};
use crate::error::Result;

type Getter<S> = Arc<dyn (Fn(&S) -> &dyn Encodable) + Send + Sync>;
type Setter<S> = Arc<dyn (Fn(&mut S) -> &mut dyn Encodable) + Send + Sync>;
type Lens<O, S> = Arc<dyn (Fn(&O) -> &S) + Send + Sync>;
type LensMut<O, S> = Arc<dyn (Fn(&mut O) -> &mut S) + Send + Sync>;

/// A message type whose wire layout is described by its declared fields
pub trait Structure: Encodable + Default + Sized + 'static {
    /// Field declarations in source order
    fn declare() -> Vec<FieldDecl<Self>>;

    /// The cached descriptor for this type, resolved on first use
    fn descriptor() -> Result<Arc<RecordDescriptor<Self>>> {
        crate::core::cache::global().descriptor::<Self>()
    }
}

/// Read/write handle to one field's storage inside an instance of `S`
pub struct Accessor<S> {
    get: Getter<S>,
    get_mut: Setter<S>,
}

impl<S: 'static> Accessor<S> {
    pub fn new<G, M>(get: G, get_mut: M) -> Self
    where
        G: (for<'a> Fn(&'a S) -> &'a dyn Encodable) + Send + Sync + 'static,
        M: (for<'a> Fn(&'a mut S) -> &'a mut dyn Encodable) + Send + Sync + 'static,
    {
        Self {
            get: Arc::new(get),
            get_mut: Arc::new(get_mut),
        }
    }

    pub fn get<'a>(&self, instance: &'a S) -> &'a dyn Encodable {
        (self.get)(instance)
    }

    pub fn get_mut<'a>(&self, instance: &'a mut S) -> &'a mut dyn Encodable {
        (self.get_mut)(instance)
    }

    /// Re-root this accessor under an outer type that embeds `S`
    fn project<O: 'static>(self, outer: &Lens<O, S>, outer_mut: &LensMut<O, S>) -> Accessor<O> {
        let (get, get_mut) = (self.get, self.get_mut);
        let (outer, outer_mut) = (Arc::clone(outer), Arc::clone(outer_mut));
        Accessor::new(
            move |o: &O| get(outer(o)),
            move |o: &mut O| get_mut(outer_mut(o)),
        )
    }
}

impl<S> Clone for Accessor<S> {
    fn clone(&self) -> Self {
        Self {
            get: Arc::clone(&self.get),
            get_mut: Arc::clone(&self.get_mut),
        }
    }
}

/// Whether a declared field belongs to the externally visible contract
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Private,
}

/// One declared field, before resolution
pub struct FieldDecl<S> {
    name: &'static str,
    visibility: Visibility,
    kind: DeclKind<S>,
}

enum DeclKind<S> {
    Named {
        tag: &'static str,
        access: Accessor<S>,
    },
    Embedded(Vec<FieldDecl<S>>),
    /// Private storage with no wire form
    Opaque,
}

impl<S: 'static> FieldDecl<S> {
    /// A named field with its directive string (empty for none)
    pub fn named(
        name: &'static str,
        visibility: Visibility,
        tag: &'static str,
        access: Accessor<S>,
    ) -> Self {
        Self {
            name,
            visibility,
            kind: DeclKind::Named { tag, access },
        }
    }

    /// A private field; its type need not be [`Encodable`]
    pub fn private(name: &'static str) -> Self {
        Self {
            name,
            visibility: Visibility::Private,
            kind: DeclKind::Opaque,
        }
    }

    /// An anonymously composed structure whose fields are spliced in place
    pub fn embedded<T, G, M>(name: &'static str, visibility: Visibility, get: G, get_mut: M) -> Self
    where
        T: Structure,
        G: (for<'a> Fn(&'a S) -> &'a T) + Send + Sync + 'static,
        M: (for<'a> Fn(&'a mut S) -> &'a mut T) + Send + Sync + 'static,
    {
        let lens: Lens<S, T> = Arc::new(get);
        let lens_mut: LensMut<S, T> = Arc::new(get_mut);
        let inner = T::declare()
            .into_iter()
            .map(|decl| decl.project(&lens, &lens_mut))
            .collect();

        Self {
            name,
            visibility,
            kind: DeclKind::Embedded(inner),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, DeclKind::Embedded(_))
    }

    fn project<O: 'static>(self, outer: &Lens<O, S>, outer_mut: &LensMut<O, S>) -> FieldDecl<O> {
        let kind = match self.kind {
            DeclKind::Named { tag, access } => DeclKind::Named {
                tag,
                access: access.project(outer, outer_mut),
            },
            DeclKind::Embedded(inner) => DeclKind::Embedded(
                inner
                    .into_iter()
                    .map(|decl| decl.project(outer, outer_mut))
                    .collect(),
            ),
            DeclKind::Opaque => DeclKind::Opaque,
        };

        FieldDecl {
            name: self.name,
            visibility: self.visibility,
            kind,
        }
    }
}

/// One resolved field of a message type
pub struct FieldDescriptor<S> {
    pub name: String,
    pub bit_size: u8,
    pub switch_value: i64,
    pub switch_field: String,
    pub length_field: String,
    value: Accessor<S>,
    length_slot: Option<usize>,
    switch_slot: Option<usize>,
    count_of: Option<usize>,
}

impl<S: 'static> FieldDescriptor<S> {
    pub fn new(name: impl Into<String>, tag: FieldTag, value: Accessor<S>) -> Self {
        Self {
            name: name.into(),
            bit_size: tag.bit_size,
            switch_value: tag.switch_value,
            switch_field: tag.switch_field,
            length_field: tag.length_field,
            value,
            length_slot: None,
            switch_slot: None,
            count_of: None,
        }
    }

    pub fn value<'a>(&self, instance: &'a S) -> &'a dyn Encodable {
        self.value.get(instance)
    }

    pub fn value_mut<'a>(&self, instance: &'a mut S) -> &'a mut dyn Encodable {
        self.value.get_mut(instance)
    }

    pub fn is_bit_packed(&self) -> bool {
        self.bit_size > 0
    }

    pub fn is_length_linked(&self) -> bool {
        !self.length_field.is_empty()
    }

    pub fn is_switched(&self) -> bool {
        !self.switch_field.is_empty()
    }

    /// Index of the sibling holding this field's element count
    pub fn length_slot(&self) -> Option<usize> {
        self.length_slot
    }

    /// Index of the sibling gating this field
    pub fn switch_slot(&self) -> Option<usize> {
        self.switch_slot
    }

    /// Index of the sequence whose element count this field carries
    pub fn count_of(&self) -> Option<usize> {
        self.count_of
    }

    /// Directive values as a tag, for comparison and display
    pub fn tag(&self) -> FieldTag {
        FieldTag {
            bit_size: self.bit_size,
            switch_value: self.switch_value,
            switch_field: self.switch_field.clone(),
            length_field: self.length_field.clone(),
        }
    }
}

impl<S> PartialEq for FieldDescriptor<S> {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.bit_size == other.bit_size
            && self.switch_value == other.switch_value
            && self.switch_field == other.switch_field
            && self.length_field == other.length_field
    }
}

impl<S> fmt::Debug for FieldDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldDescriptor")
            .field("name", &self.name)
            .field("bit_size", &self.bit_size)
            .field("switch_value", &self.switch_value)
            .field("switch_field", &self.switch_field)
            .field("length_field", &self.length_field)
            .finish()
    }
}

/// Ordered, immutable field layout of one message type
pub struct RecordDescriptor<S> {
    type_name: &'static str,
    fields: Vec<FieldDescriptor<S>>,
}

impl<S: 'static> RecordDescriptor<S> {
    /// Build a record and link every `lengthField`/`switchField` to its sibling index
    pub fn new(type_name: &'static str, mut fields: Vec<FieldDescriptor<S>>) -> Self {
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(fields.len());
        for (index, field) in fields.iter().enumerate() {
            positions.entry(field.name.clone()).or_insert(index);
        }

        for index in 0..fields.len() {
            if fields[index].is_switched() {
                fields[index].switch_slot = positions.get(&fields[index].switch_field).copied();
            }
            if fields[index].is_length_linked() {
                let slot = positions.get(&fields[index].length_field).copied();
                fields[index].length_slot = slot;
                if let Some(slot) = slot {
                    if slot > index {
                        warn!(
                            type_name,
                            field = %fields[index].name,
                            sibling = %fields[slot].name,
                            "Length field is declared after its sequence"
                        );
                    }
                    if fields[slot].count_of.is_none() {
                        fields[slot].count_of = Some(index);
                    }
                }
            }
        }

        Self { type_name, fields }
    }

    /// Resolve a list of declarations into a record
    pub fn resolve(type_name: &'static str, decls: Vec<FieldDecl<S>>) -> Result<Self> {
        let mut fields = Vec::new();
        gather_fields(&mut fields, decls)?;
        let record = Self::new(type_name, fields);
        debug!(type_name, fields = record.len(), "Resolved record descriptor");
        Ok(record)
    }

    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn fields(&self) -> &[FieldDescriptor<S>] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Position of the first field with this name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&FieldDescriptor<S>> {
        self.position(name).map(|index| &self.fields[index])
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|field| field.name.as_str()).collect()
    }
}

impl<S> PartialEq for RecordDescriptor<S> {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl<S> fmt::Debug for RecordDescriptor<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordDescriptor")
            .field("type_name", &self.type_name)
            .field("fields", &self.fields)
            .finish()
    }
}

/// Resolve a structure type's declared fields, bypassing the cache
pub fn resolve<S: Structure>() -> Result<RecordDescriptor<S>> {
    RecordDescriptor::resolve(std::any::type_name::<S>(), S::declare())
}

fn gather_fields<S: 'static>(out: &mut Vec<FieldDescriptor<S>>, decls: Vec<FieldDecl<S>>) -> Result<()> {
    for decl in decls {
        if decl.visibility == Visibility::Private {
            trace!(field = decl.name, "Skipping private field");
            continue;
        }

        match decl.kind {
            DeclKind::Embedded(inner) => gather_fields(out, inner)?,
            DeclKind::Named { tag, access } => out.push(read_field(decl.name, tag, access)?),
            DeclKind::Opaque => trace!(field = decl.name, "Skipping field without wire form"),
        }
    }
    Ok(())
}

fn read_field<S: 'static>(name: &'static str, tag: &str, access: Accessor<S>) -> Result<FieldDescriptor<S>> {
    let parsed = parse_tag(tag).map_err(|e| e.in_field(name))?;
    Ok(FieldDescriptor::new(name, parsed, access))
}
