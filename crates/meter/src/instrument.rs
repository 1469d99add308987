//! Member instrumentation
//!
//! Types that want their members measurable route calls through a
//! [`MethodTable`]: each member is a [`Member`] slot holding the callable
//! currently installed for it. An [`Instrumenter`] swaps a slot's callable for
//! one that measures every call under `\methods\<Type>.<member>` and swaps the
//! original back when asked.
//!
//! # Example
//!
//! ```rust
//! use meter::{Instrumenter, Meter, MethodTable};
//! use std::rc::Rc;
//!
//! struct Parser;
//!
//! let mut table = MethodTable::for_type::<Parser>();
//! let parse = table
//!     .define("parse", |_: &Parser, input: &'static str| input.len())
//!     .unwrap();
//!
//! let instrumenter = Instrumenter::new(Rc::new(Meter::new()));
//! let len = instrumenter
//!     .with_members(&table, &["parse"], || parse.call(&Parser, "abc"))
//!     .unwrap();
//! assert_eq!(len, 3);
//!
//! let path = "\\methods\\Parser.parse".parse().unwrap();
//! assert_eq!(instrumenter.meter().get(&path).unwrap().count, 1);
//! assert!(parse.is_original());
//! ```

use crate::error::{MeterError, MeterResult};
use crate::meter::Meter;
use crate::path::{validate_label, Forest};
use std::any::Any;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

type Callable<S, A, R> = Rc<dyn Fn(&S, A) -> R>;

/// Dispatch slot for one member of a type.
///
/// Call sites hold an `Rc<Member>` and invoke it through [`Member::call`];
/// whatever callable is installed at that moment runs.
pub struct Member<S, A, R> {
    type_name: String,
    name: String,
    original: Callable<S, A, R>,
    current: RefCell<Callable<S, A, R>>,
}

impl<S: 'static, A: 'static, R: 'static> Member<S, A, R> {
    fn new(type_name: &str, name: &str, original: Callable<S, A, R>) -> Self {
        Self {
            type_name: type_name.to_string(),
            name: name.to_string(),
            current: RefCell::new(Rc::clone(&original)),
            original,
        }
    }

    /// Invoke the installed callable.
    pub fn call(&self, receiver: &S, args: A) -> R {
        // Clone out so the slot can be swapped while the call is running
        let callable = Rc::clone(&*self.current.borrow());
        callable(receiver, args)
    }

    /// Member name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Label this member is measured under, `<Type>.<member>`.
    pub fn label(&self) -> String {
        format!("{}.{}", self.type_name, self.name)
    }

    /// True while a measuring callable is installed.
    pub fn is_wrapped(&self) -> bool {
        !self.is_original()
    }

    /// True when the installed callable is the one the member was defined
    /// with.
    pub fn is_original(&self) -> bool {
        Rc::ptr_eq(&self.current.borrow(), &self.original)
    }
}

/// Type-erased view of a [`Member`] used by the instrumenter.
pub trait DispatchSlot {
    /// Member name.
    fn name(&self) -> &str;
    /// True while a measuring callable is installed.
    fn is_wrapped(&self) -> bool;
    /// Install a callable that measures into `meter`. Returns false when the
    /// slot was already wrapped.
    fn wrap(&self, meter: Weak<Meter>) -> bool;
    /// Reinstall the original callable. Returns false when the slot was not
    /// wrapped.
    fn restore(&self) -> bool;
    /// Downcasting support for typed lookups.
    fn as_any(&self) -> &dyn Any;
}

impl<S: 'static, A: 'static, R: 'static> DispatchSlot for Member<S, A, R> {
    fn name(&self) -> &str {
        &self.name
    }

    fn is_wrapped(&self) -> bool {
        Member::is_wrapped(self)
    }

    fn wrap(&self, meter: Weak<Meter>) -> bool {
        if self.is_wrapped() {
            return false;
        }
        let original = Rc::clone(&self.original);
        let label = self.label();
        let measured: Callable<S, A, R> = Rc::new(move |receiver: &S, args: A| {
            match meter.upgrade() {
                Some(meter) => {
                    meter.measure_in(Forest::Methods, &label, || original(receiver, args))
                }
                None => original(receiver, args),
            }
        });
        *self.current.borrow_mut() = measured;
        true
    }

    fn restore(&self) -> bool {
        if self.is_original() {
            return false;
        }
        *self.current.borrow_mut() = Rc::clone(&self.original);
        true
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// The measurable members of one type, keyed by name.
pub struct MethodTable {
    type_name: String,
    members: BTreeMap<String, Rc<dyn DispatchSlot>>,
}

impl MethodTable {
    /// Create an empty table for the type called `type_name`.
    pub fn new(type_name: &str) -> MeterResult<Self> {
        validate_label(type_name)?;
        Ok(Self {
            type_name: type_name.to_string(),
            members: BTreeMap::new(),
        })
    }

    /// Create an empty table named after `T`, without its module path.
    pub fn for_type<T: ?Sized>() -> Self {
        Self {
            type_name: short_type_name(std::any::type_name::<T>()),
            members: BTreeMap::new(),
        }
    }

    /// Register a member and return its dispatch slot.
    ///
    /// Defining a name twice replaces the earlier slot; handles to the old
    /// slot keep calling the old callable.
    pub fn define<S, A, R, F>(&mut self, name: &str, f: F) -> MeterResult<Rc<Member<S, A, R>>>
    where
        S: 'static,
        A: 'static,
        R: 'static,
        F: Fn(&S, A) -> R + 'static,
    {
        validate_label(name)?;
        let member = Rc::new(Member::new(&self.type_name, name, Rc::new(f)));
        let slot: Rc<dyn DispatchSlot> = member.clone();
        self.members.insert(name.to_string(), slot);
        Ok(member)
    }

    /// Name of the type, as used in measurement labels.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Registered member names, sorted.
    pub fn member_names(&self) -> Vec<&str> {
        self.members.keys().map(String::as_str).collect()
    }

    /// The slot registered under `name`.
    pub fn slot(&self, name: &str) -> Option<&Rc<dyn DispatchSlot>> {
        self.members.get(name)
    }

    /// Typed access to a member, `None` when the name is unknown or the
    /// signature does not match.
    pub fn member<S: 'static, A: 'static, R: 'static>(&self, name: &str) -> Option<&Member<S, A, R>> {
        self.members
            .get(name)
            .and_then(|slot| slot.as_any().downcast_ref::<Member<S, A, R>>())
    }

    /// Names of the members currently wrapped.
    pub fn wrapped_members(&self) -> Vec<&str> {
        self.members
            .iter()
            .filter(|(_, slot)| slot.is_wrapped())
            .map(|(name, _)| name.as_str())
            .collect()
    }

    fn require(&self, name: &str) -> MeterResult<&Rc<dyn DispatchSlot>> {
        self.members.get(name).ok_or_else(|| MeterError::UnknownMember {
            type_name: self.type_name.clone(),
            member: name.to_string(),
        })
    }
}

fn short_type_name(full: &str) -> String {
    let base = full.split('<').next().unwrap_or(full);
    base.rsplit("::").next().unwrap_or(base).to_string()
}

type SlotKey = (String, String);

/// Installs and removes measuring callables for one meter.
///
/// Everything an instrumenter wrapped is restored when it is dropped.
pub struct Instrumenter {
    meter: Rc<Meter>,
    wrapped: RefCell<BTreeMap<SlotKey, Rc<dyn DispatchSlot>>>,
}

impl Instrumenter {
    /// Create an instrumenter recording into `meter`.
    pub fn new(meter: Rc<Meter>) -> Self {
        Self {
            meter,
            wrapped: RefCell::new(BTreeMap::new()),
        }
    }

    /// The meter calls are recorded into.
    pub fn meter(&self) -> &Rc<Meter> {
        &self.meter
    }

    /// Wrap one member. Returns `Ok(false)` if it was already wrapped.
    pub fn wrap_member(&self, table: &MethodTable, member: &str) -> MeterResult<bool> {
        let slot = table.require(member)?;
        if !slot.wrap(Rc::downgrade(&self.meter)) {
            tracing::debug!(
                target: "meter::instrument",
                type_name = table.type_name(),
                member,
                "member already wrapped"
            );
            return Ok(false);
        }
        self.wrapped.borrow_mut().insert(
            (table.type_name().to_string(), member.to_string()),
            Rc::clone(slot),
        );
        tracing::debug!(
            target: "meter::instrument",
            type_name = table.type_name(),
            member,
            "member wrapped"
        );
        Ok(true)
    }

    /// Restore one member. Returns `Ok(false)` if this instrumenter did not
    /// wrap it, including when another instrumenter did.
    pub fn unwrap_member(&self, table: &MethodTable, member: &str) -> MeterResult<bool> {
        let slot = table.require(member)?;
        let key = (table.type_name().to_string(), member.to_string());
        {
            let mut wrapped = self.wrapped.borrow_mut();
            match wrapped.get(&key) {
                Some(own) if Rc::ptr_eq(own, slot) => {
                    wrapped.remove(&key);
                }
                _ => return Ok(false),
            }
        }
        let restored = slot.restore();
        if restored {
            tracing::debug!(
                target: "meter::instrument",
                type_name = table.type_name(),
                member,
                "member restored"
            );
        }
        Ok(restored)
    }

    /// Restore every member of `table` this instrumenter wrapped. Returns
    /// how many were restored.
    pub fn unwrap_all(&self, table: &MethodTable) -> usize {
        let names: Vec<String> = table
            .wrapped_members()
            .into_iter()
            .map(str::to_string)
            .collect();
        names
            .iter()
            .filter(|name| matches!(self.unwrap_member(table, name), Ok(true)))
            .count()
    }

    /// Wrap several members. Unknown names fail the whole call before
    /// anything is wrapped. Returns how many were newly wrapped.
    pub fn wrap_members(&self, table: &MethodTable, members: &[&str]) -> MeterResult<usize> {
        for member in members {
            table.require(member)?;
        }
        let mut wrapped = 0;
        for member in members {
            if self.wrap_member(table, member)? {
                wrapped += 1;
            }
        }
        Ok(wrapped)
    }

    /// Restore several members. Unknown names fail the whole call before
    /// anything is restored. Returns how many were restored.
    pub fn unwrap_members(&self, table: &MethodTable, members: &[&str]) -> MeterResult<usize> {
        for member in members {
            table.require(member)?;
        }
        let mut restored = 0;
        for member in members {
            if self.unwrap_member(table, member)? {
                restored += 1;
            }
        }
        Ok(restored)
    }

    /// Wrap `members` for the duration of `body`.
    ///
    /// Members wrapped by this call are restored afterwards, also when the
    /// body panics. Members that were already wrapped stay wrapped.
    pub fn with_members<T, F>(&self, table: &MethodTable, members: &[&str], body: F) -> MeterResult<T>
    where
        F: FnOnce() -> T,
    {
        for member in members {
            table.require(member)?;
        }
        let mut guard = ScopedMembers {
            instrumenter: self,
            table,
            members: Vec::with_capacity(members.len()),
        };
        for member in members {
            if self.wrap_member(table, member)? {
                guard.members.push(member.to_string());
            }
        }
        Ok(body())
    }

    /// Number of members currently wrapped by this instrumenter.
    pub fn wrapped_count(&self) -> usize {
        self.wrapped.borrow().len()
    }

    fn restore_everything(&self) {
        let slots = std::mem::take(&mut *self.wrapped.borrow_mut());
        for ((type_name, member), slot) in slots {
            if slot.restore() {
                tracing::debug!(
                    target: "meter::instrument",
                    type_name = type_name.as_str(),
                    member = member.as_str(),
                    "member restored"
                );
            }
        }
    }
}

impl Drop for Instrumenter {
    fn drop(&mut self) {
        self.restore_everything();
    }
}

struct ScopedMembers<'a> {
    instrumenter: &'a Instrumenter,
    table: &'a MethodTable,
    members: Vec<String>,
}

impl Drop for ScopedMembers<'_> {
    fn drop(&mut self) {
        for member in &self.members {
            let _ = self.instrumenter.unwrap_member(self.table, member);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::MeasurementPath;
    use std::panic::{catch_unwind, AssertUnwindSafe};

    struct Calculator {
        offset: i64,
    }

    fn path(s: &str) -> MeasurementPath {
        s.parse().unwrap()
    }

    fn calculator_table() -> (MethodTable, Rc<Member<Calculator, (i64, i64), i64>>) {
        let mut table = MethodTable::for_type::<Calculator>();
        let add = table
            .define("add", |c: &Calculator, (a, b): (i64, i64)| a + b + c.offset)
            .unwrap();
        table
            .define("reset", |_: &Calculator, (): ()| ())
            .unwrap();
        (table, add)
    }

    #[test]
    fn test_type_name_is_short() {
        let (table, add) = calculator_table();
        assert_eq!(table.type_name(), "Calculator");
        assert_eq!(add.label(), "Calculator.add");
        assert_eq!(short_type_name("alloc::vec::Vec<alloc::string::String>"), "Vec");
        assert_eq!(table.member_names(), vec!["add", "reset"]);
    }

    #[test]
    fn test_wrap_records_and_forwards() {
        let (table, add) = calculator_table();
        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));
        let calc = Calculator { offset: 10 };

        assert!(instrumenter.wrap_member(&table, "add").unwrap());
        assert_eq!(add.call(&calc, (1, 2)), 13);
        assert_eq!(add.call(&calc, (0, 0)), 10);

        let m = instrumenter
            .meter()
            .get(&path("\\methods\\Calculator.add"))
            .unwrap();
        assert_eq!(m.count, 2);
        assert_eq!(table.wrapped_members(), vec!["add"]);
    }

    #[test]
    fn test_rewrap_is_noop() {
        let (table, add) = calculator_table();
        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));
        assert!(instrumenter.wrap_member(&table, "add").unwrap());
        assert!(!instrumenter.wrap_member(&table, "add").unwrap());

        add.call(&Calculator { offset: 0 }, (1, 1));
        // One wrapper only, so exactly one entry per call
        let m = instrumenter
            .meter()
            .get(&path("\\methods\\Calculator.add"))
            .unwrap();
        assert_eq!(m.count, 1);
        assert_eq!(instrumenter.meter().len(), 2);
    }

    #[test]
    fn test_unwrap_restores_original() {
        let (table, add) = calculator_table();
        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));

        assert!(!instrumenter.unwrap_member(&table, "add").unwrap());
        instrumenter.wrap_member(&table, "add").unwrap();
        assert!(add.is_wrapped());
        assert!(instrumenter.unwrap_member(&table, "add").unwrap());
        assert!(add.is_original());
        assert!(table.wrapped_members().is_empty());

        add.call(&Calculator { offset: 0 }, (1, 1));
        assert!(instrumenter.meter().is_empty());
    }

    #[test]
    fn test_unwrap_leaves_other_instrumenters_wraps() {
        let (table, add) = calculator_table();
        let owner = Instrumenter::new(Rc::new(Meter::new()));
        let other = Instrumenter::new(Rc::new(Meter::new()));

        assert!(owner.wrap_member(&table, "add").unwrap());
        assert!(!other.wrap_member(&table, "add").unwrap());
        assert!(!other.unwrap_member(&table, "add").unwrap());
        assert_eq!(other.unwrap_all(&table), 0);
        assert_eq!(other.unwrap_members(&table, &["add"]).unwrap(), 0);
        assert!(add.is_wrapped());

        add.call(&Calculator { offset: 0 }, (2, 3));
        assert_eq!(
            owner
                .meter()
                .get(&path("\\methods\\Calculator.add"))
                .unwrap()
                .count,
            1
        );
        assert!(other.meter().is_empty());

        drop(other);
        assert!(add.is_wrapped());
        assert!(owner.unwrap_member(&table, "add").unwrap());
        assert!(add.is_original());
    }

    #[test]
    fn test_unknown_member() {
        let (table, _add) = calculator_table();
        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));
        assert!(matches!(
            instrumenter.wrap_member(&table, "divide"),
            Err(MeterError::UnknownMember { .. })
        ));
        // Batch calls check every name first
        assert!(instrumenter.wrap_members(&table, &["add", "divide"]).is_err());
        assert!(table.wrapped_members().is_empty());
    }

    #[test]
    fn test_batch_wrap_and_unwrap_all() {
        let (table, _add) = calculator_table();
        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));
        assert_eq!(instrumenter.wrap_members(&table, &["add", "reset"]).unwrap(), 2);
        assert_eq!(instrumenter.wrap_members(&table, &["add"]).unwrap(), 0);
        assert_eq!(instrumenter.unwrap_members(&table, &["reset"]).unwrap(), 1);
        assert_eq!(instrumenter.unwrap_all(&table), 1);
        assert_eq!(instrumenter.wrapped_count(), 0);
    }

    #[test]
    fn test_nested_member_calls_nest_paths() {
        let mut table = MethodTable::new("Pipeline").unwrap();
        let inner = table.define("stage", |_: &(), x: u32| x * 2).unwrap();
        let inner_handle = Rc::clone(&inner);
        let outer = table
            .define("run", move |_: &(), x: u32| inner_handle.call(&(), x) + 1)
            .unwrap();

        let meter = Rc::new(Meter::new());
        let instrumenter = Instrumenter::new(Rc::clone(&meter));
        instrumenter.wrap_members(&table, &["run", "stage"]).unwrap();

        let result = meter
            .measure("job", || outer.call(&(), 20))
            .unwrap();
        assert_eq!(result, 41);
        assert!(meter
            .get(&path("\\blocks\\job\\Pipeline.run\\Pipeline.stage"))
            .is_some());

        outer.call(&(), 1);
        assert!(meter
            .get(&path("\\methods\\Pipeline.run\\Pipeline.stage"))
            .is_some());
    }

    #[test]
    fn test_with_members_restores_on_panic() {
        let (table, add) = calculator_table();
        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            instrumenter
                .with_members(&table, &["add"], || {
                    add.call(&Calculator { offset: 0 }, (1, 1));
                    panic!("body failed");
                })
                .unwrap();
        }));
        assert!(outcome.is_err());
        assert!(add.is_original());
        assert_eq!(instrumenter.wrapped_count(), 0);
    }

    #[test]
    fn test_dropped_meter_passes_through() {
        let (table, add) = calculator_table();
        let meter = Rc::new(Meter::new());
        {
            let instrumenter = Instrumenter::new(Rc::clone(&meter));
            instrumenter.wrap_member(&table, "add").unwrap();
            // Dropping the instrumenter restores the member
        }
        assert!(add.is_original());

        let instrumenter = Instrumenter::new(Rc::new(Meter::new()));
        instrumenter.wrap_member(&table, "add").unwrap();
        let slot = Rc::clone(table.slot("add").unwrap());
        drop(instrumenter);
        assert!(!slot.is_wrapped());

        // A wrapper whose meter is gone still forwards the call
        slot.wrap(Weak::new());
        assert_eq!(add.call(&Calculator { offset: 1 }, (1, 1)), 3);
        assert!(slot.restore());
    }

    #[test]
    fn test_typed_lookup() {
        let (table, _add) = calculator_table();
        assert!(table.member::<Calculator, (i64, i64), i64>("add").is_some());
        assert!(table.member::<Calculator, (), u8>("add").is_none());
    }
}
