//! SAT-backed decision oracle using rustsat + rustsat-batsat.
//!
//! Provides an alternative to the replay oracle of `linmon_core` that
//! encodes a query as a SAT problem instead of searching orders directly.
//!
//! # Encoding
//!
//! Every pair of operations gets a `before(i, j)` variable; totality,
//! antisymmetry and transitivity clauses make any model a strict total
//! order, and every asserted fact becomes a unit clause. The object is then
//! axiomatized over its elements (an add with the remove that observed it):
//!
//! - collections: an add precedes its remove, and an empty remove `e` sees
//!   every element either added after it or removed before it;
//! - queue: `a1 < a2` implies `r1 < r2`, and an element never removed
//!   cannot be added before one that was;
//! - stack: no `a1 < a2 < r1 < r2`, and no `a2 < a1 < r2` when the first
//!   element is never removed;
//! - lock: released elements do not overlap, and every other element ends
//!   before a lock that is never released;
//! - register: every read follows the write it observed with no other
//!   write in between; initial reads precede every write;
//! - set: per value, an operation that needs the value present follows a
//!   successful add with no successful change in between, and one that needs
//!   it absent has a successful change after every successful add before it;
//! - single-permit semaphore: as a lock.
//!
//! Operations still pending stay in the order but only take part in the
//! axioms if they may have taken effect: a pending add only when some
//! completed remove observed it, a pending remove or release through a
//! fresh variable selecting whether (and, for removes, what) it took
//! effect.
//!
//! The axioms are exact for histories whose added values are distinct
//! and whose lock owners never overlap their own calls. Queries outside
//! that fragment, and every query on a semaphore with several permits, are
//! answered [`OracleVerdict::Unknown`].
//!
// TODO: keep one solver per base scope and add the pushed facts under
//   assumption literals instead of re-encoding every check.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use linmon_core::history::{OpId, Operation, Value};
use linmon_core::oracle::{GroundFacts, Oracle, OracleVerdict, ScopedFacts};
use linmon_core::scheme::{Kind, MethodSchema, Role, Scheme, ValueSource};
use rustsat::solvers::{Solve, SolverResult};
use rustsat::types::{Clause, Lit, TernaryVal};
use rustsat_batsat::BasicSolver;

/// Map from operation pairs to SAT variable indices, plus auxiliary
/// variables.
///
/// For each ordered pair `(i, j)`, `before(i, j)` is true iff operation `i`
/// is placed before operation `j` in the linearization.
struct OrderVars {
    vars: HashMap<(OpId, OpId), u32>,
    next_var: u32,
}

impl OrderVars {
    fn new() -> Self {
        Self {
            vars: HashMap::new(),
            next_var: 0,
        }
    }

    fn get_or_create(&mut self, a: OpId, b: OpId) -> u32 {
        *self.vars.entry((a, b)).or_insert_with(|| {
            let v = self.next_var;
            self.next_var += 1;
            v
        })
    }

    fn fresh(&mut self) -> Lit {
        let v = self.next_var;
        self.next_var += 1;
        Lit::positive(v)
    }
}

/// A clause literal that may already be decided.
#[derive(Debug, Clone, Copy)]
enum Term {
    True,
    False,
    Lit(Lit),
}

impl Term {
    fn negate(self) -> Self {
        match self {
            Self::True => Self::False,
            Self::False => Self::True,
            Self::Lit(lit) => Self::Lit(!lit),
        }
    }
}

/// Why an encoding stopped early.
enum Shortcut {
    Unsat,
    Unknown,
}

struct Encoder {
    solver: BasicSolver,
    vars: OrderVars,
    vertices: Vec<OpId>,
    contradiction: bool,
    failed: bool,
}

impl Encoder {
    /// Encode common ordering constraints for a set of operations with a
    /// partial order.
    fn new(vertices: Vec<OpId>, edges: &[(OpId, OpId)]) -> Self {
        let mut encoder = Self {
            solver: BasicSolver::default(),
            vars: OrderVars::new(),
            vertices,
            contradiction: false,
            failed: false,
        };
        let vertices = encoder.vertices.clone();

        // Exactly one of before(a,b), before(b,a) holds (total order).
        for (idx_a, &a) in vertices.iter().enumerate() {
            for &b in &vertices[idx_a + 1..] {
                let ab = encoder.before(a, b);
                let ba = encoder.before(b, a);
                encoder.clause([ab, ba]);
                encoder.clause([ab.negate(), ba.negate()]);
            }
        }

        // Transitivity: before(a,b) AND before(b,c) => before(a,c)
        for &a in &vertices {
            for &b in &vertices {
                if a == b {
                    continue;
                }
                for &c in &vertices {
                    if c == a || c == b {
                        continue;
                    }
                    let nab = encoder.not_before(a, b);
                    let nbc = encoder.not_before(b, c);
                    let ac = encoder.before(a, c);
                    encoder.clause([nab, nbc, ac]);
                }
            }
        }

        for &(a, b) in edges {
            let ab = encoder.before(a, b);
            encoder.clause([ab]);
        }
        encoder
    }

    /// `before(a, b)`; an operation is never before itself.
    fn before(&mut self, a: OpId, b: OpId) -> Term {
        if a == b {
            Term::False
        } else {
            Term::Lit(Lit::positive(self.vars.get_or_create(a, b)))
        }
    }

    fn not_before(&mut self, a: OpId, b: OpId) -> Term {
        self.before(a, b).negate()
    }

    fn fresh(&mut self) -> Lit {
        self.vars.fresh()
    }

    fn clause(&mut self, terms: impl IntoIterator<Item = Term>) {
        let mut lits = Vec::new();
        for term in terms {
            match term {
                Term::True => return,
                Term::False => {}
                Term::Lit(lit) => lits.push(lit),
            }
        }
        if lits.is_empty() {
            self.contradiction = true;
            return;
        }
        let clause: Clause = lits.into_iter().collect();
        if self.solver.add_clause(clause).is_err() {
            self.failed = true;
        }
    }

    /// At most one of `lits` holds.
    fn at_most_one(&mut self, lits: &[Lit]) {
        for (i, &a) in lits.iter().enumerate() {
            for &b in &lits[i + 1..] {
                self.clause([Term::Lit(!a), Term::Lit(!b)]);
            }
        }
    }

    fn solve(&mut self) -> OracleVerdict {
        if self.contradiction {
            return OracleVerdict::Unsat;
        }
        if self.failed {
            return OracleVerdict::Unknown;
        }
        match self.solver.solve() {
            Ok(SolverResult::Sat) => OracleVerdict::Sat,
            Ok(SolverResult::Unsat) => OracleVerdict::Unsat,
            Ok(SolverResult::Interrupted) | Err(_) => OracleVerdict::Unknown,
        }
    }

    /// Extract a total ordering of the operations from the SAT solver model.
    ///
    /// For each operation `u`, counts how many other operations `w` have
    /// `before(w, u)` true in the satisfying assignment, yielding a
    /// position in the linearization.
    fn extract_order(&self) -> Vec<OpId> {
        let mut positioned: Vec<(usize, OpId)> = self
            .vertices
            .iter()
            .map(|&u| {
                let pos = self
                    .vertices
                    .iter()
                    .filter(|&&w| {
                        self.vars.vars.get(&(w, u)).is_some_and(|&var_idx| {
                            matches!(
                                self.solver.lit_val(Lit::positive(var_idx)),
                                Ok(TernaryVal::True)
                            )
                        })
                    })
                    .count();
                (pos, u)
            })
            .collect();
        positioned.sort_by_key(|&(pos, _)| pos);
        positioned.into_iter().map(|(_, v)| v).collect()
    }
}

/// An operation with the schema of its method.
#[derive(Clone, Copy)]
struct Classified<'a> {
    op: &'a Operation,
    schema: MethodSchema,
}

impl Classified<'_> {
    fn id(&self) -> OpId {
        self.op.id
    }

    fn value(&self) -> Option<Value> {
        self.schema.value_of(self.op)
    }

    const fn pending(&self) -> bool {
        self.op.is_pending()
    }
}

/// An add with its remove: completed, chosen among pending removes, or none.
struct Element {
    add: OpId,
    removed_by: Option<OpId>,
    choices: Vec<(Lit, OpId)>,
}

impl Element {
    /// `(guard, remove)` pairs: the clause of an axiom about the remove
    /// holds unless the guard is false.
    fn options(&self) -> Vec<(Term, OpId)> {
        match self.removed_by {
            Some(r) => vec![(Term::False, r)],
            None => self
                .choices
                .iter()
                .map(|&(m, p)| (Term::Lit(!m), p))
                .collect(),
        }
    }

    /// Terms true iff the element is removed; `None` if it certainly is.
    fn removed(&self) -> Option<Vec<Term>> {
        self.removed_by
            .is_none()
            .then(|| self.choices.iter().map(|&(m, _)| Term::Lit(m)).collect())
    }
}

fn encode_collection(
    enc: &mut Encoder,
    kind: Kind,
    ops: &[Classified<'_>],
) -> Result<(), Shortcut> {
    let mut adds: BTreeMap<Value, Classified<'_>> = BTreeMap::new();
    let mut removals: BTreeMap<OpId, OpId> = BTreeMap::new();
    let mut witnesses = Vec::new();
    let mut floating = Vec::new();

    for c in ops {
        match (c.schema.role, c.schema.value) {
            (Role::Add, ValueSource::Arg(_)) => {
                let value = c.value().unwrap_or(Value::Empty);
                if value.is_empty() || adds.insert(value, *c).is_some() {
                    return Err(Shortcut::Unknown);
                }
            }
            (Role::Remove, ValueSource::Ret(_)) if c.pending() => floating.push(c.id()),
            (Role::Remove, _) if c.pending() => return Err(Shortcut::Unknown),
            (Role::Remove, _) => {}
            _ => return Err(Shortcut::Unknown),
        }
    }
    for c in ops.iter().filter(|c| c.schema.role == Role::Remove && !c.pending()) {
        let value = c.value().unwrap_or(Value::Empty);
        if value.is_empty() {
            witnesses.push(c.id());
            continue;
        }
        let add = adds.get(&value).ok_or(Shortcut::Unsat)?;
        if removals.insert(add.id(), c.id()).is_some() {
            return Err(Shortcut::Unsat);
        }
    }

    let mut elements = Vec::new();
    for add in adds.values() {
        let removed_by = removals.get(&add.id()).copied();
        if add.pending() && removed_by.is_none() {
            continue;
        }
        let mut choices = Vec::new();
        if removed_by.is_none() {
            for &p in &floating {
                choices.push((enc.fresh(), p));
            }
        }
        elements.push(Element {
            add: add.id(),
            removed_by,
            choices,
        });
    }

    // a pending remove takes effect on at most one element, and an element
    // is taken by at most one pending remove
    for element in &elements {
        let lits: Vec<Lit> = element.choices.iter().map(|&(m, _)| m).collect();
        enc.at_most_one(&lits);
    }
    for &p in &floating {
        let lits: Vec<Lit> = elements
            .iter()
            .flat_map(|e| e.choices.iter().filter(|(_, q)| *q == p).map(|&(m, _)| m))
            .collect();
        enc.at_most_one(&lits);
    }

    for element in &elements {
        let a = element.add;
        for (guard, r) in element.options() {
            let ar = enc.before(a, r);
            enc.clause([guard, ar]);
        }
        for &e in &witnesses {
            let mut terms = vec![enc.before(e, a)];
            if let Some(r) = element.removed_by {
                terms.push(enc.before(r, e));
            }
            for &(m, p) in &element.choices {
                let t = enc.fresh();
                let pe = enc.before(p, e);
                enc.clause([Term::Lit(!t), Term::Lit(m)]);
                enc.clause([Term::Lit(!t), pe]);
                terms.push(Term::Lit(t));
            }
            enc.clause(terms);
        }
    }

    for (i, first) in elements.iter().enumerate() {
        for (j, second) in elements.iter().enumerate() {
            if i == j {
                continue;
            }
            match kind {
                Kind::Queue => fifo_axioms(enc, first, second),
                Kind::Stack => lifo_axioms(enc, first, second),
                _ => {}
            }
        }
    }
    Ok(())
}

fn fifo_axioms(enc: &mut Encoder, first: &Element, second: &Element) {
    let (a1, a2) = (first.add, second.add);
    for (g1, r1) in first.options() {
        for (g2, r2) in second.options() {
            if r1 == r2 {
                continue;
            }
            let clause = [g1, g2, enc.not_before(a1, a2), enc.before(r1, r2)];
            enc.clause(clause);
        }
    }
    if let Some(removed) = first.removed() {
        for (g2, _) in second.options() {
            let mut clause = removed.clone();
            clause.extend([g2, enc.not_before(a1, a2)]);
            enc.clause(clause);
        }
    }
}

fn lifo_axioms(enc: &mut Encoder, first: &Element, second: &Element) {
    let (a1, a2) = (first.add, second.add);
    for (g1, r1) in first.options() {
        for (g2, r2) in second.options() {
            if r1 == r2 {
                continue;
            }
            let clause = [
                g1,
                g2,
                enc.not_before(a1, a2),
                enc.not_before(a2, r1),
                enc.not_before(r1, r2),
            ];
            enc.clause(clause);
        }
    }
    if let Some(removed) = first.removed() {
        for (g2, r2) in second.options() {
            let mut clause = removed.clone();
            clause.extend([g2, enc.not_before(a2, a1), enc.not_before(a1, r2)]);
            enc.clause(clause);
        }
    }
}

/// A lock acquisition with its release, if any.
struct Hold {
    lock: OpId,
    unlock: Option<OpId>,
    released: Term,
}

/// Whether `to` is reachable from `from` along asserted facts.
fn reaches(adj: &HashMap<OpId, Vec<OpId>>, from: OpId, to: OpId) -> bool {
    let mut seen = HashSet::from([from]);
    let mut queue = VecDeque::from([from]);
    while let Some(x) = queue.pop_front() {
        for &y in adj.get(&x).map_or(&[][..], Vec::as_slice) {
            if y == to {
                return true;
            }
            if seen.insert(y) {
                queue.push_back(y);
            }
        }
    }
    false
}

fn encode_lock(
    enc: &mut Encoder,
    ops: &[Classified<'_>],
    edges: &[(OpId, OpId)],
) -> Result<(), Shortcut> {
    let mut adj: HashMap<OpId, Vec<OpId>> = HashMap::new();
    for &(x, y) in edges {
        adj.entry(x).or_default().push(y);
    }

    let mut by_owner: BTreeMap<Value, Vec<Classified<'_>>> = BTreeMap::new();
    for c in ops {
        if !matches!(c.schema.value, ValueSource::Arg(_))
            || !matches!(c.schema.role, Role::Add | Role::Remove)
        {
            return Err(Shortcut::Unknown);
        }
        by_owner
            .entry(c.value().unwrap_or(Value::Empty))
            .or_default()
            .push(*c);
    }

    let mut holds = Vec::new();
    for calls in by_owner.values() {
        // an owner's calls must be totally ordered by the facts
        let mut ranked = Vec::with_capacity(calls.len());
        for c in calls {
            let mut rank = 0;
            for d in calls {
                if c.id() == d.id() {
                    continue;
                }
                if reaches(&adj, d.id(), c.id()) {
                    rank += 1;
                } else if !reaches(&adj, c.id(), d.id()) {
                    return Err(Shortcut::Unknown);
                }
            }
            ranked.push((rank, *c));
        }
        ranked.sort_by_key(|(rank, _)| *rank);

        let mut current: Option<Classified<'_>> = None;
        for (_, c) in ranked {
            if c.schema.role == Role::Add {
                if let Some(held) = current {
                    return Err(if held.pending() || c.pending() {
                        Shortcut::Unknown
                    } else {
                        Shortcut::Unsat
                    });
                }
                current = Some(c);
                continue;
            }
            let Some(lock) = current.take() else {
                if c.pending() {
                    continue;
                }
                return Err(Shortcut::Unsat);
            };
            let released = match (lock.pending(), c.pending()) {
                (true, true) => continue,
                (false, true) => Term::Lit(enc.fresh()),
                _ => Term::True,
            };
            holds.push(Hold {
                lock: lock.id(),
                unlock: Some(c.id()),
                released,
            });
        }
        if let Some(lock) = current {
            if !lock.pending() {
                holds.push(Hold {
                    lock: lock.id(),
                    unlock: None,
                    released: Term::False,
                });
            }
        }
    }

    for hold in &holds {
        if let Some(u) = hold.unlock {
            let lu = enc.before(hold.lock, u);
            enc.clause([hold.released.negate(), lu]);
        }
    }
    for (i, first) in holds.iter().enumerate() {
        for (j, second) in holds.iter().enumerate() {
            if i == j {
                continue;
            }
            let (r1, r2) = (first.released, second.released);
            if let (Some(u1), Some(u2)) = (first.unlock, second.unlock) {
                if i < j {
                    let clause = [
                        r1.negate(),
                        r2.negate(),
                        enc.before(u1, second.lock),
                        enc.before(u2, first.lock),
                    ];
                    enc.clause(clause);
                }
            }
            if let Some(u2) = second.unlock {
                // first is held forever: second ends before it starts
                let clause = [r1, r2.negate(), enc.before(u2, first.lock)];
                enc.clause(clause);
            }
            if i < j {
                enc.clause([r1, r2]);
            }
        }
    }
    Ok(())
}

fn encode_register(enc: &mut Encoder, ops: &[Classified<'_>]) -> Result<(), Shortcut> {
    let mut writes: Vec<(OpId, Value, Term)> = Vec::new();
    let mut reads: Vec<(OpId, Value)> = Vec::new();
    for c in ops {
        match c.schema.role {
            Role::Write => {
                let value = c.value().unwrap_or(Value::Empty);
                if value.is_empty() {
                    return Err(Shortcut::Unknown);
                }
                let active = if c.pending() {
                    Term::Lit(enc.fresh())
                } else {
                    Term::True
                };
                writes.push((c.id(), value, active));
            }
            Role::Read if c.pending() => {}
            Role::Read => reads.push((c.id(), c.value().unwrap_or(Value::Empty))),
            _ => return Err(Shortcut::Unknown),
        }
    }

    for (r, value) in reads {
        if value.is_empty() {
            for &(w, _, active) in &writes {
                let rw = enc.before(r, w);
                enc.clause([active.negate(), rw]);
            }
            continue;
        }
        let mut sources = Vec::new();
        for &(w, ref written, active) in &writes {
            if *written != value {
                continue;
            }
            let s = enc.fresh();
            sources.push(Term::Lit(s));
            let wr = enc.before(w, r);
            enc.clause([Term::Lit(!s), active]);
            enc.clause([Term::Lit(!s), wr]);
            for &(w2, _, active2) in &writes {
                if w2 == w {
                    continue;
                }
                let clause = [
                    Term::Lit(!s),
                    enc.not_before(w, w2),
                    active2.negate(),
                    enc.before(r, w2),
                ];
                enc.clause(clause);
            }
        }
        if sources.is_empty() {
            return Err(Shortcut::Unsat);
        }
        enc.clause(sources);
    }
    Ok(())
}

/// A set operation that may change the membership of its value.
struct Change {
    id: OpId,
    adds: bool,
    active: Term,
}

/// Membership a set operation requires right before it, under `guard`.
struct Expect {
    id: OpId,
    present: bool,
    guard: Term,
}

fn encode_set(enc: &mut Encoder, ops: &[Classified<'_>]) -> Result<(), Shortcut> {
    let mut by_value: BTreeMap<Value, (Vec<Change>, Vec<Expect>)> = BTreeMap::new();
    for c in ops {
        let value = c.value().ok_or(Shortcut::Unknown)?;
        let (changes, expects) = by_value.entry(value).or_default();
        if c.pending() {
            // a pending call either succeeded or had no effect
            if c.schema.role == Role::Read {
                continue;
            }
            let adds = c.schema.role == Role::Add;
            let active = Term::Lit(enc.fresh());
            changes.push(Change {
                id: c.id(),
                adds,
                active,
            });
            expects.push(Expect {
                id: c.id(),
                present: !adds,
                guard: active,
            });
            continue;
        }

        let Some(Value::Bool(ok)) = c.op.rets.as_ref().and_then(|rets| rets.first()).cloned()
        else {
            return Err(Shortcut::Unknown);
        };
        let present = match c.schema.role {
            Role::Add | Role::Remove => {
                let adds = c.schema.role == Role::Add;
                if ok {
                    changes.push(Change {
                        id: c.id(),
                        adds,
                        active: Term::True,
                    });
                }
                ok != adds
            }
            Role::Read => ok,
            Role::Write => return Err(Shortcut::Unknown),
        };
        expects.push(Expect {
            id: c.id(),
            present,
            guard: Term::True,
        });
    }

    for (changes, expects) in by_value.values() {
        for expect in expects {
            if expect.present {
                expect_present(enc, changes, expect);
            } else {
                expect_absent(enc, changes, expect);
            }
        }
    }
    Ok(())
}

/// The last successful change before `expect` is an add.
fn expect_present(enc: &mut Encoder, changes: &[Change], expect: &Expect) {
    let x = expect.id;
    let mut sources = vec![expect.guard.negate()];
    for w in changes.iter().filter(|w| w.adds && w.id != x) {
        let s = enc.fresh();
        sources.push(Term::Lit(s));
        let wx = enc.before(w.id, x);
        enc.clause([Term::Lit(!s), w.active]);
        enc.clause([Term::Lit(!s), wx]);
        for w2 in changes.iter().filter(|w2| w2.id != w.id && w2.id != x) {
            let clause = [
                Term::Lit(!s),
                w2.active.negate(),
                enc.not_before(w.id, w2.id),
                enc.not_before(w2.id, x),
            ];
            enc.clause(clause);
        }
    }
    enc.clause(sources);
}

/// Every successful add before `expect` is followed by another successful
/// change before it.
fn expect_absent(enc: &mut Encoder, changes: &[Change], expect: &Expect) {
    let x = expect.id;
    for w in changes.iter().filter(|w| w.adds && w.id != x) {
        let mut clause = vec![
            expect.guard.negate(),
            w.active.negate(),
            enc.not_before(w.id, x),
        ];
        for w2 in changes.iter().filter(|w2| w2.id != w.id && w2.id != x) {
            let t = enc.fresh();
            clause.push(Term::Lit(t));
            let ww2 = enc.before(w.id, w2.id);
            let w2x = enc.before(w2.id, x);
            enc.clause([Term::Lit(!t), w2.active]);
            enc.clause([Term::Lit(!t), ww2]);
            enc.clause([Term::Lit(!t), w2x]);
        }
        enc.clause(clause);
    }
}

/// Encode `facts` under `scheme` without solving.
fn encode(scheme: &Scheme, facts: &GroundFacts) -> Result<Encoder, Shortcut> {
    let mut ops = Vec::with_capacity(facts.len());
    for op in facts.operations.values() {
        let schema = scheme.method(&op.method).ok_or(Shortcut::Unknown)?;
        ops.push(Classified {
            op,
            schema: *schema,
        });
    }
    if matches!(scheme.kind, Kind::Semaphore { permits } if permits != 1) {
        return Err(Shortcut::Unknown);
    }
    let edges: Vec<(OpId, OpId)> = facts.known_order().collect();
    if edges.iter().any(|(x, y)| x == y) {
        return Err(Shortcut::Unsat);
    }

    let mut enc = Encoder::new(facts.operations.keys().copied().collect(), &edges);
    match scheme.kind {
        Kind::Queue | Kind::Stack | Kind::Bag => encode_collection(&mut enc, scheme.kind, &ops)?,
        Kind::Lock | Kind::Semaphore { .. } => encode_lock(&mut enc, &ops, &edges)?,
        Kind::Register => encode_register(&mut enc, &ops)?,
        Kind::Set => encode_set(&mut enc, &ops)?,
    }
    Ok(enc)
}

/// Decides `facts` under the axioms of `scheme`.
#[must_use]
pub fn decide(scheme: &Scheme, facts: &GroundFacts) -> OracleVerdict {
    let verdict = match encode(scheme, facts) {
        Ok(mut enc) => enc.solve(),
        Err(Shortcut::Unsat) => OracleVerdict::Unsat,
        Err(Shortcut::Unknown) => OracleVerdict::Unknown,
    };
    tracing::trace!(operations = facts.len(), ?verdict, "sat: decided");
    verdict
}

/// A linearization of `facts`, if the query is satisfiable.
#[must_use]
pub fn linearize(scheme: &Scheme, facts: &GroundFacts) -> Option<Vec<OpId>> {
    let mut enc = encode(scheme, facts).ok()?;
    (enc.solve() == OracleVerdict::Sat).then(|| enc.extract_order())
}

/// Oracle answering every query with a fresh SAT encoding.
#[derive(Debug, Clone, Default)]
pub struct SatOracle {
    facts: ScopedFacts,
}

impl SatOracle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Oracle for SatOracle {
    fn name(&self) -> &'static str {
        "sat"
    }

    fn push(&mut self) {
        self.facts.push();
    }

    fn pop(&mut self) {
        self.facts.pop();
    }

    fn assert(&mut self, facts: &GroundFacts) {
        self.facts.assert(facts);
    }

    fn check(&mut self, scheme: &Scheme) -> OracleVerdict {
        decide(scheme, &self.facts.flatten())
    }

    fn reset(&mut self) {
        self.facts.clear();
    }
}
