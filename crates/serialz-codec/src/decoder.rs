use std::collections::BTreeMap;

use serialz_types::{TypeName, Value};
use tracing::debug;

use crate::stream::{Global, Op, BUILTINS, MAX_DEPTH};

/// Outcome of running an object stream through the [`RestrictedDecoder`].
#[derive(Clone, Debug, PartialEq)]
pub enum Decoded {
    /// The stream only used allow-listed constructors.
    Accepted(Value),
    /// The stream was refused; nothing was constructed.
    Rejected(Rejection),
}

impl Decoded {
    /// The decoded value, or `None` if the stream was rejected.
    pub fn accepted(self) -> Option<Value> {
        match self {
            Self::Accepted(value) => Some(value),
            Self::Rejected(_) => None,
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Why a stream was refused.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum Rejection {
    /// The stream referenced a constructor outside the allow-list.
    #[error("unresolvable constructor reference: {0}")]
    Unresolvable(Global),

    #[error("malformed stream at op {at}: {reason}")]
    Malformed { at: usize, reason: String },

    #[error("containers nested deeper than {max}")]
    TooDeep { max: usize },
}

/// Rebuilds values from an object stream, resolving constructor references
/// only against an allow-list of value types.
///
/// Constructor references are looked up with [`find_constructor`], which
/// answers `None` for anything outside the allow-list instead of failing.
/// The first unresolvable reference ends the run with
/// [`Rejection::Unresolvable`]; everything built so far is dropped. Because
/// the allow-list is a set of [`TypeName`]s, no reference can ever resolve
/// to a type outside that closed set, whatever the stream claims.
///
/// The allow-list also bounds what literal ops may produce: every value the
/// decoder builds, literal or constructed, must be of an allowed kind, and a
/// type descriptor may only name an allowed kind. A narrowed decoder such as
/// `allowing(&[TypeName::Tuple, TypeName::Int])` therefore accepts tuples of
/// integers and refuses a `List` op.
///
/// [`find_constructor`]: RestrictedDecoder::find_constructor
#[derive(Clone, Debug)]
pub struct RestrictedDecoder {
    allowed: Vec<TypeName>,
    max_depth: usize,
}

impl Default for RestrictedDecoder {
    fn default() -> Self {
        Self {
            allowed: TypeName::ALL.to_vec(),
            max_depth: MAX_DEPTH,
        }
    }
}

impl RestrictedDecoder {
    /// A decoder allowing every value constructor.
    pub fn new() -> Self {
        Self::default()
    }

    /// A decoder allowing only the given kinds of value.
    ///
    /// Applying a constructor needs only that constructor's kind; keeping a
    /// type descriptor as data also needs [`TypeName::Type`].
    pub fn allowing(types: &[TypeName]) -> Self {
        Self {
            allowed: types.to_vec(),
            ..Self::default()
        }
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Resolve a constructor reference against the allow-list.
    pub fn find_constructor(&self, global: &Global) -> Option<TypeName> {
        if global.module != BUILTINS {
            return None;
        }
        TypeName::from_name(&global.name).filter(|t| self.allowed.contains(t))
    }

    /// Run a stream's ops and return the single value they leave behind.
    pub fn decode(&self, ops: &[Op]) -> Decoded {
        match self.run(ops) {
            Ok(value) => Decoded::Accepted(value),
            Err(rejection) => {
                debug!(%rejection, ops = ops.len(), "object stream rejected");
                Decoded::Rejected(rejection)
            }
        }
    }

    fn run(&self, ops: &[Op]) -> Result<Value, Rejection> {
        // Each slot carries the container depth of its value.
        let mut stack: Vec<(Value, usize)> = Vec::new();

        for (at, op) in ops.iter().enumerate() {
            let malformed = |reason: &str| Rejection::Malformed {
                at,
                reason: reason.to_string(),
            };

            match op {
                Op::Bool(b) => stack.push((self.admit(Value::Bool(*b))?, 0)),
                Op::Int(i) => stack.push((self.admit(Value::Int(*i))?, 0)),
                Op::Float(x) => stack.push((self.admit(Value::Float(*x))?, 0)),
                Op::Str(s) => stack.push((self.admit(Value::Text(s.clone()))?, 0)),
                Op::Bytes(b) => stack.push((self.admit(Value::Bytes(b.clone()))?, 0)),
                Op::List(n) => {
                    self.require(TypeName::List)?;
                    let items = pop_n(&mut stack, *n as usize)
                        .ok_or_else(|| malformed("stack underflow"))?;
                    self.admit_items(&items)?;
                    let depth = self.nest(&items)?;
                    let items = items.into_iter().map(|(v, _)| v).collect();
                    stack.push((Value::List(items), depth));
                }
                Op::Dict(n) => {
                    self.require(TypeName::Dict)?;
                    let count = (*n as usize)
                        .checked_mul(2)
                        .ok_or_else(|| malformed("mapping size overflow"))?;
                    let flat =
                        pop_n(&mut stack, count).ok_or_else(|| malformed("stack underflow"))?;
                    self.admit_items(&flat)?;
                    let depth = self.nest(&flat)?;
                    let mut map = BTreeMap::new();
                    let mut entries = flat.into_iter().map(|(v, _)| v);
                    while let (Some(key), Some(value)) = (entries.next(), entries.next()) {
                        let Value::Text(key) = key else {
                            return Err(malformed("mapping key is not a string"));
                        };
                        map.insert(key, value);
                    }
                    stack.push((Value::Map(map), depth));
                }
                Op::Global(global) => {
                    let Some(constructor) = self.find_constructor(global) else {
                        return Err(Rejection::Unresolvable(global.clone()));
                    };
                    stack.push((Value::Type(constructor), 0));
                }
                Op::Reduce(argc) => {
                    let args = pop_n(&mut stack, *argc as usize)
                        .ok_or_else(|| malformed("stack underflow"))?;
                    let (callee, _) = stack.pop().ok_or_else(|| malformed("stack underflow"))?;
                    let Value::Type(constructor) = callee else {
                        return Err(malformed("reduce target is not a constructor"));
                    };
                    // A descriptor built by `type(x)` must pass the allow-list too.
                    if !self.allowed.contains(&constructor) {
                        return Err(Rejection::Unresolvable(Global::builtin(constructor)));
                    }
                    self.admit_items(&args)?;
                    let depth = args.iter().map(|(_, d)| *d).max().unwrap_or(0);
                    let args = args.into_iter().map(|(v, _)| v).collect();
                    let value = construct(constructor, args)
                        .map_err(|reason| Rejection::Malformed { at, reason })?;
                    stack.push((self.admit(value)?, depth));
                }
            }
        }

        let left = stack.len();
        self.admit_items(&stack)?;
        match stack.pop() {
            Some((value, _)) if left == 1 => Ok(value),
            _ => Err(Rejection::Malformed {
                at: ops.len(),
                reason: format!("stream left {left} values, expected 1"),
            }),
        }
    }

    fn require(&self, kind: TypeName) -> Result<(), Rejection> {
        if self.allowed.contains(&kind) {
            Ok(())
        } else {
            Err(Rejection::Unresolvable(Global::builtin(kind)))
        }
    }

    /// Check a freshly built value against the allow-list.
    fn admit(&self, value: Value) -> Result<Value, Rejection> {
        self.require(value.kind())?;
        if let Value::Type(named) = &value {
            self.require(*named)?;
        }
        Ok(value)
    }

    /// Constructor references on the stack become data once collected; as
    /// data they are type descriptors and need `type` allowed.
    fn admit_items(&self, items: &[(Value, usize)]) -> Result<(), Rejection> {
        if items.iter().any(|(v, _)| matches!(v, Value::Type(_))) {
            self.require(TypeName::Type)?;
        }
        Ok(())
    }

    fn nest(&self, items: &[(Value, usize)]) -> Result<usize, Rejection> {
        let depth = 1 + items.iter().map(|(_, d)| *d).max().unwrap_or(0);
        if depth > self.max_depth {
            return Err(Rejection::TooDeep {
                max: self.max_depth,
            });
        }
        Ok(depth)
    }
}

fn pop_n<T>(stack: &mut Vec<T>, n: usize) -> Option<Vec<T>> {
    let at = stack.len().checked_sub(n)?;
    Some(stack.split_off(at))
}

/// Apply an allow-listed constructor to at most one argument.
fn construct(constructor: TypeName, mut args: Vec<Value>) -> Result<Value, String> {
    if args.len() > 1 {
        return Err(format!(
            "{constructor}() takes at most 1 argument ({} given)",
            args.len()
        ));
    }
    let arg = args.pop();

    match (constructor, arg) {
        (TypeName::Type, Some(v)) => Ok(Value::Type(v.kind())),
        (TypeName::Type, None) => Err("type() takes 1 argument".into()),
        (TypeName::Bool, None) => Ok(Value::Bool(false)),
        (TypeName::Bool, Some(v)) => Ok(Value::Bool(v.is_truthy())),
        (TypeName::Int, None) => Ok(Value::Int(0)),
        (TypeName::Int, Some(Value::Int(i))) => Ok(Value::Int(i)),
        (TypeName::Int, Some(Value::Bool(b))) => Ok(Value::Int(i64::from(b))),
        (TypeName::Int, Some(Value::Float(x))) => float_to_int(x).map(Value::Int),
        (TypeName::Int, Some(Value::Text(s))) => s
            .trim()
            .parse()
            .map(Value::Int)
            .map_err(|e| format!("invalid literal for int(): {e}")),
        (TypeName::Float, None) => Ok(Value::Float(0.0)),
        (TypeName::Float, Some(Value::Float(x))) => Ok(Value::Float(x)),
        (TypeName::Float, Some(Value::Int(i))) => Ok(Value::Float(i as f64)),
        (TypeName::Float, Some(Value::Bool(b))) => Ok(Value::Float(if b { 1.0 } else { 0.0 })),
        (TypeName::Float, Some(Value::Text(s))) => s
            .trim()
            .parse()
            .map(Value::Float)
            .map_err(|e| format!("invalid literal for float(): {e}")),
        (TypeName::Str, None) => Ok(Value::Text(String::new())),
        (TypeName::Str, Some(Value::Text(s))) => Ok(Value::Text(s)),
        (TypeName::Str, Some(v)) => Ok(Value::Text(v.to_string())),
        (TypeName::Bytes, arg) => byte_source(arg).map(Value::Bytes),
        (TypeName::ByteArray, arg) => byte_source(arg).map(Value::ByteArray),
        (TypeName::List, arg) => sequence_source(arg).map(Value::List),
        (TypeName::Tuple, arg) => sequence_source(arg).map(Value::Tuple),
        (TypeName::Set, arg) => {
            sequence_source(arg).map(|items| Value::Set(items.into_iter().collect()))
        }
        (TypeName::Dict, None) => Ok(Value::Map(BTreeMap::new())),
        (TypeName::Dict, Some(Value::Map(map))) => Ok(Value::Map(map)),
        (TypeName::Dict, Some(Value::List(pairs) | Value::Tuple(pairs))) => pairs_to_map(pairs),
        (constructor, Some(v)) => Err(format!("{constructor}() cannot be built from {}", v.kind())),
    }
}

fn float_to_int(x: f64) -> Result<i64, String> {
    let t = x.trunc();
    if !t.is_finite() || t < i64::MIN as f64 || t >= i64::MAX as f64 {
        return Err(format!("cannot convert float {x} to int"));
    }
    Ok(t as i64)
}

fn byte_source(arg: Option<Value>) -> Result<Vec<u8>, String> {
    match arg {
        None => Ok(Vec::new()),
        Some(Value::Bytes(b) | Value::ByteArray(b)) => Ok(b),
        Some(Value::List(items) | Value::Tuple(items)) => items
            .into_iter()
            .map(|v| match v {
                Value::Int(i) => u8::try_from(i).map_err(|_| format!("byte out of range: {i}")),
                other => Err(format!("byte must be int, not {}", other.kind())),
            })
            .collect(),
        Some(v) => Err(format!("cannot build bytes from {}", v.kind())),
    }
}

fn sequence_source(arg: Option<Value>) -> Result<Vec<Value>, String> {
    match arg {
        None => Ok(Vec::new()),
        Some(Value::List(items) | Value::Tuple(items)) => Ok(items),
        Some(Value::Set(set)) => Ok(set.into_iter().collect()),
        Some(v) => Err(format!("{} is not iterable here", v.kind())),
    }
}

fn pairs_to_map(pairs: Vec<Value>) -> Result<Value, String> {
    let mut map = BTreeMap::new();
    for pair in pairs {
        let (Value::List(mut kv) | Value::Tuple(mut kv)) = pair else {
            return Err("dict() items must be pairs".into());
        };
        if kv.len() != 2 {
            return Err(format!("dict() item has length {}, expected 2", kv.len()));
        }
        let value = kv.pop().unwrap_or(Value::Bool(false));
        let Some(Value::Text(key)) = kv.pop() else {
            return Err("dict() keys must be strings".into());
        };
        map.insert(key, value);
    }
    Ok(Value::Map(map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialz_types::ValueSet;

    fn decode(ops: Vec<Op>) -> Decoded {
        RestrictedDecoder::new().decode(&ops)
    }

    fn builtin(name: TypeName) -> Op {
        Op::Global(Global::builtin(name))
    }

    // -----------------------------------------------------------------------
    // Constructor resolution
    // -----------------------------------------------------------------------

    #[test]
    fn every_value_constructor_resolves() {
        let decoder = RestrictedDecoder::new();
        for t in TypeName::ALL {
            assert_eq!(decoder.find_constructor(&Global::builtin(t)), Some(t));
        }
    }

    #[test]
    fn foreign_references_are_unresolvable() {
        let decoder = RestrictedDecoder::new();
        assert_eq!(decoder.find_constructor(&Global::new("os", "system")), None);
        assert_eq!(decoder.find_constructor(&Global::new("builtins", "eval")), None);
        assert_eq!(decoder.find_constructor(&Global::new("builtins", "object")), None);
        assert_eq!(decoder.find_constructor(&Global::new("subprocess", "int")), None);
        assert_eq!(decoder.find_constructor(&Global::new("", "")), None);
    }

    #[test]
    fn narrowed_allow_list() {
        let decoder = RestrictedDecoder::allowing(&[TypeName::Tuple]);
        assert!(decoder.find_constructor(&Global::builtin(TypeName::Tuple)).is_some());
        assert!(decoder.find_constructor(&Global::builtin(TypeName::Set)).is_none());
    }

    // -----------------------------------------------------------------------
    // Rejection
    // -----------------------------------------------------------------------

    #[test]
    fn disallowed_reduce_is_rejected() {
        let out = decode(vec![
            Op::Global(Global::new("os", "system")),
            Op::Str("rm -rf /".into()),
            Op::Reduce(1),
        ]);
        assert_eq!(
            out,
            Decoded::Rejected(Rejection::Unresolvable(Global::new("os", "system")))
        );
    }

    #[test]
    fn disallowed_reference_nested_in_mapping_rejects_whole_stream() {
        let out = decode(vec![
            Op::Str("ok".into()),
            Op::Int(1),
            Op::Str("evil".into()),
            Op::Global(Global::new("builtins", "eval")),
            Op::Str("1+1".into()),
            Op::Reduce(1),
            Op::Dict(2),
        ]);
        assert!(out.is_rejected());
        assert!(out.accepted().is_none());
    }

    #[test]
    fn type_descriptor_outside_narrowed_list_cannot_be_applied() {
        // type([]) yields the list descriptor; applying it must still be gated.
        let decoder = RestrictedDecoder::allowing(&[TypeName::Type]);
        let out = decoder.decode(&[
            builtin(TypeName::Type),
            Op::List(0),
            Op::Reduce(1),
            Op::List(0),
            Op::Reduce(1),
        ]);
        assert_eq!(
            out,
            Decoded::Rejected(Rejection::Unresolvable(Global::builtin(TypeName::List)))
        );
    }

    #[test]
    fn narrowed_decoder_gates_literals() {
        let decoder = RestrictedDecoder::allowing(&[TypeName::Tuple, TypeName::Int]);
        let via_list = [builtin(TypeName::Tuple), Op::Int(1), Op::List(1), Op::Reduce(1)];
        assert_eq!(
            decoder.decode(&via_list),
            Decoded::Rejected(Rejection::Unresolvable(Global::builtin(TypeName::List)))
        );
        assert_eq!(
            decoder.decode(&[Op::Str("x".into())]),
            Decoded::Rejected(Rejection::Unresolvable(Global::builtin(TypeName::Str)))
        );
        assert_eq!(decoder.decode(&[Op::Int(7)]), Decoded::Accepted(Value::Int(7)));
    }

    #[test]
    fn narrowed_decoder_gates_type_descriptors() {
        // Applying `type` is allowed, but the descriptor it yields names str.
        let decoder = RestrictedDecoder::allowing(&[TypeName::Type, TypeName::Int]);
        let out = decoder.decode(&[builtin(TypeName::Type), Op::Int(1), Op::Reduce(1)]);
        assert_eq!(out, Decoded::Accepted(Value::Type(TypeName::Int)));

        let decoder = RestrictedDecoder::allowing(&[TypeName::Type, TypeName::Str]);
        let out = decoder.decode(&[builtin(TypeName::Type), Op::Str("s".into()), Op::Reduce(1)]);
        assert_eq!(out, Decoded::Accepted(Value::Type(TypeName::Str)));

        let decoder = RestrictedDecoder::allowing(&[TypeName::Type, TypeName::Int, TypeName::Bool]);
        let out = decoder.decode(&[
            builtin(TypeName::Type),
            builtin(TypeName::Bool),
            Op::Int(1),
            Op::Reduce(1),
            Op::Reduce(1),
        ]);
        // type(bool(1)) is the bool descriptor, which is allowed.
        assert_eq!(out, Decoded::Accepted(Value::Type(TypeName::Bool)));

        // A bare descriptor kept as data needs `type` allowed.
        let decoder = RestrictedDecoder::allowing(&[TypeName::Int]);
        assert!(decoder.decode(&[builtin(TypeName::Int)]).is_rejected());
    }

    #[test]
    fn large_sets_decode_quickly() {
        let n: i64 = 200_000;
        let mut ops = vec![builtin(TypeName::Set)];
        ops.extend((0..n).map(|i| Op::Int(n - i)));
        ops.extend((0..1000).map(Op::Int));
        ops.push(Op::List(n as u32 + 1000));
        ops.push(Op::Reduce(1));

        let started = std::time::Instant::now();
        let out = decode(ops);
        assert!(started.elapsed() < std::time::Duration::from_secs(5));
        match out {
            Decoded::Accepted(Value::Set(set)) => assert_eq!(set.len(), n as usize + 1),
            other => panic!("expected a set, got {other:?}"),
        }
    }

    #[test]
    fn underflow_is_malformed() {
        assert!(matches!(
            decode(vec![Op::List(2)]),
            Decoded::Rejected(Rejection::Malformed { at: 0, .. })
        ));
        assert!(matches!(
            decode(vec![Op::Reduce(0)]),
            Decoded::Rejected(Rejection::Malformed { .. })
        ));
    }

    #[test]
    fn leftover_values_are_malformed() {
        assert!(matches!(
            decode(vec![Op::Int(1), Op::Int(2)]),
            Decoded::Rejected(Rejection::Malformed { at: 2, .. })
        ));
        assert!(decode(vec![]).is_rejected());
    }

    #[test]
    fn reduce_on_literal_is_malformed() {
        assert!(decode(vec![Op::Int(1), Op::Int(2), Op::Reduce(1)]).is_rejected());
    }

    #[test]
    fn non_string_mapping_key_is_malformed() {
        assert!(decode(vec![Op::Int(1), Op::Int(2), Op::Dict(1)]).is_rejected());
    }

    #[test]
    fn nesting_limit() {
        let decoder = RestrictedDecoder::new().with_max_depth(3);
        let mut ops = vec![Op::Int(0)];
        ops.extend(std::iter::repeat(Op::List(1)).take(3));
        assert!(matches!(decoder.decode(&ops), Decoded::Accepted(_)));

        ops.push(Op::List(1));
        assert_eq!(
            decoder.decode(&ops),
            Decoded::Rejected(Rejection::TooDeep { max: 3 })
        );
    }

    // -----------------------------------------------------------------------
    // Construction
    // -----------------------------------------------------------------------

    #[test]
    fn builds_rich_values() {
        let out = decode(vec![
            Op::Str("raw".into()),
            builtin(TypeName::ByteArray),
            Op::Bytes(vec![1, 2]),
            Op::Reduce(1),
            Op::Str("pair".into()),
            builtin(TypeName::Tuple),
            Op::Int(1),
            Op::Str("a".into()),
            Op::List(2),
            Op::Reduce(1),
            Op::Str("tags".into()),
            builtin(TypeName::Set),
            Op::Str("x".into()),
            Op::Str("x".into()),
            Op::List(2),
            Op::Reduce(1),
            Op::Str("kind".into()),
            builtin(TypeName::Int),
            Op::Dict(4),
        ]);

        let value = out.accepted().expect("accepted");
        let map = value.as_map().unwrap();
        assert_eq!(map["raw"], Value::ByteArray(vec![1, 2]));
        assert_eq!(
            map["pair"],
            Value::Tuple(vec![Value::Int(1), Value::from("a")])
        );
        assert_eq!(
            map["tags"],
            Value::Set([Value::from("x")].into_iter().collect::<ValueSet>())
        );
        assert_eq!(map["kind"], Value::Type(TypeName::Int));
    }

    #[test]
    fn scalar_conversions() {
        let cases = vec![
            (TypeName::Int, Op::Str(" 42 ".into()), Value::Int(42)),
            (TypeName::Int, Op::Float(3.9), Value::Int(3)),
            (TypeName::Float, Op::Int(2), Value::Float(2.0)),
            (TypeName::Bool, Op::Str(String::new()), Value::Bool(false)),
            (TypeName::Str, Op::Int(7), Value::from("7")),
            (TypeName::Type, Op::Bytes(vec![]), Value::Type(TypeName::Bytes)),
        ];
        for (constructor, arg, expected) in cases {
            let out = decode(vec![builtin(constructor), arg, Op::Reduce(1)]);
            assert_eq!(out, Decoded::Accepted(expected), "{constructor}");
        }
    }

    #[test]
    fn zero_argument_constructors() {
        assert_eq!(
            decode(vec![builtin(TypeName::Dict), Op::Reduce(0)]),
            Decoded::Accepted(Value::Map(BTreeMap::new()))
        );
        assert!(decode(vec![builtin(TypeName::Type), Op::Reduce(0)]).is_rejected());
    }

    #[test]
    fn dict_from_pairs() {
        let out = decode(vec![
            builtin(TypeName::Dict),
            Op::Str("k".into()),
            Op::Int(1),
            Op::List(2),
            Op::List(1),
            Op::Reduce(1),
        ]);
        let value = out.accepted().unwrap();
        assert_eq!(value.as_map().unwrap()["k"], Value::Int(1));
    }

    #[test]
    fn bad_constructor_argument_is_malformed() {
        assert!(decode(vec![builtin(TypeName::Int), Op::Str("x".into()), Op::Reduce(1)]).is_rejected());
        assert!(decode(vec![builtin(TypeName::Bytes), Op::Int(300), Op::List(1), Op::Reduce(1)]).is_rejected());
        assert!(decode(vec![builtin(TypeName::Int), Op::Float(f64::NAN), Op::Reduce(1)]).is_rejected());
        assert!(decode(vec![builtin(TypeName::Int), Op::Int(1), Op::Int(2), Op::Reduce(2)]).is_rejected());
    }
}
