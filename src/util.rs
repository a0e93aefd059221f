use crate::env::Environment;
use crate::expr::Expr;
use crate::level::Level;
use crate::name::Name;
use crate::pretty_printer::{PpOptions, PrettyPrinter};
use crate::tc::TypeChecker;
use indexmap::{IndexMap, IndexSet};
use num_bigint::BigUint;
use rustc_hash::FxHasher;
use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::hash::BuildHasherDefault;
use std::marker::PhantomData;
use std::sync::Arc;

/// Dag items carry precomputed 64 bit hashes, so the index sets that store
/// them hash by passing the stored digest straight through.
pub struct UniqueHasher {
    digest: u64,
}

impl Default for UniqueHasher {
    fn default() -> UniqueHasher { UniqueHasher { digest: 0 } }
}

impl std::hash::Hasher for UniqueHasher {
    fn finish(&self) -> u64 { self.digest }

    fn write(&mut self, _: &[u8]) {
        unreachable!("hash-consed items only ever write their precomputed u64");
    }

    fn write_u64(&mut self, i: u64) {
        // one digest per hashing session
        debug_assert_eq!(self.digest, 0);
        self.digest = i;
    }
}

pub(crate) type UniqueIndexSet<A> = IndexSet<A, BuildHasherDefault<UniqueHasher>>;
pub(crate) type FxIndexSet<A> = IndexSet<A, BuildHasherDefault<FxHasher>>;
pub(crate) type FxIndexMap<K, V> = IndexMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxHashMap<K, V> = HashMap<K, V, BuildHasherDefault<FxHasher>>;
pub(crate) type FxHashSet<K> = HashSet<K, BuildHasherDefault<FxHasher>>;

pub(crate) fn new_fx_index_map<K, V>() -> FxIndexMap<K, V> { FxIndexMap::with_hasher(Default::default()) }

pub(crate) fn new_fx_hash_map<K, V>() -> FxHashMap<K, V> { FxHashMap::with_hasher(Default::default()) }

pub(crate) fn new_fx_hash_set<K>() -> FxHashSet<K> { FxHashSet::with_hasher(Default::default()) }

pub(crate) fn new_fx_index_set<K>() -> FxIndexSet<K> { FxIndexSet::with_hasher(Default::default()) }

pub(crate) fn new_unique_index_set<K>() -> UniqueIndexSet<K> { UniqueIndexSet::with_hasher(Default::default()) }

/// An integer pointer to a term-language item, which can live in either the
/// environment's persistent dag, or a printing context's temporary dag.
/// Rather than storing a separate tag, the pointer folds the dag selector
/// into the index word itself: the high bit is clear for persistent items
/// and set for temporary ones, so the raw word doubles as the item's
/// identity hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ptr<A> {
    raw: u32,
    pub(crate) ph: PhantomData<A>,
}

const LIVE_BIT: u32 = 1 << 31;

impl<A> Ptr<A> {
    pub(crate) fn from(dag_marker: DagMarker, idx: usize) -> Self {
        let idx = u32::try_from(idx).unwrap();
        debug_assert_eq!(idx & LIVE_BIT, 0);
        let raw = match dag_marker {
            DagMarker::Env => idx,
            DagMarker::Live => idx | LIVE_BIT,
        };
        Self { raw, ph: PhantomData }
    }

    pub(crate) fn idx(&self) -> usize { (self.raw & !LIVE_BIT) as usize }

    pub(crate) fn dag_marker(&self) -> DagMarker {
        if self.raw & LIVE_BIT == 0 {
            DagMarker::Env
        } else {
            DagMarker::Live
        }
    }

    pub(crate) fn get_hash(&self) -> u64 { self.raw as u64 }
}

impl<A> std::hash::Hash for Ptr<A> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DagMarker {
    /// The persistent dag owned by the environment.
    Env,
    /// The temporary dag owned by a printing context.
    Live,
}

pub(crate) type CowStr<'a> = Cow<'a, str>;
pub type StringPtr<'a> = Ptr<&'a CowStr<'a>>;
pub type NamePtr<'a> = Ptr<&'a Name<'a>>;
pub type LevelPtr<'a> = Ptr<&'a Level<'a>>;
pub type LevelsPtr<'a> = Ptr<&'a Arc<[LevelPtr<'a>]>>;
pub type ExprPtr<'a> = Ptr<&'a Expr<'a>>;
pub type ExprsPtr<'a> = Ptr<&'a Arc<[ExprPtr<'a>]>>;
pub type BigUintPtr<'a> = Ptr<&'a BigUint>;

/// Convenience macro for creating a 64 bit hash.
#[macro_export]
macro_rules! hash64 {
    ( $( $x:expr ),* ) => {
        {
            use std::hash::{ Hash, Hasher };
            let mut hasher = rustc_hash::FxHasher::default();
            $(
                ($x).hash(&mut hasher);
            )*
            hasher.finish()
        }
    };
}

/// The underlying storage for `Name`, `Level`, and `Expr` items (plus strings,
/// universe argument lists, macro argument lists, and bignums).
#[derive(Debug)]
pub struct TermDag<'a> {
    pub names: UniqueIndexSet<Name<'a>>,
    pub levels: UniqueIndexSet<Level<'a>>,
    pub exprs: UniqueIndexSet<Expr<'a>>,
    pub strings: FxIndexSet<CowStr<'a>>,
    pub uparams: FxIndexSet<Arc<[LevelPtr<'a>]>>,
    pub expr_lists: FxIndexSet<Arc<[ExprPtr<'a>]>>,
    pub bignums: FxIndexSet<BigUint>,
}

impl<'a> TermDag<'a> {
    /// The anonymous name and level zero are back-referenced as the 0th element
    /// of their kind without ever being explicitly allocated, so every dag
    /// begins by placing them in the 0th position of their backing storage.
    pub fn new() -> Self {
        let mut out = Self {
            names: new_unique_index_set(),
            levels: new_unique_index_set(),
            exprs: new_unique_index_set(),
            strings: new_fx_index_set(),
            uparams: new_fx_index_set(),
            expr_lists: new_fx_index_set(),
            bignums: new_fx_index_set(),
        };
        let _ = out.names.insert(Name::Anon);
        let _ = out.levels.insert(Level::Zero);
        out
    }
}

impl<'a> Default for TermDag<'a> {
    fn default() -> Self { Self::new() }
}

/// Names the printer recognizes structurally: the annotation markers, the
/// placeholder, the binary numeral constants, and the prefix used for
/// freshly generated internal names. These are allocated once into the
/// environment's persistent dag so recognition is pointer equality.
#[derive(Debug, Clone, Copy)]
pub struct NameCache<'a> {
    pub(crate) have_: NamePtr<'a>,
    pub(crate) show_: NamePtr<'a>,
    pub(crate) let_: NamePtr<'a>,
    pub(crate) let_value: NamePtr<'a>,
    pub(crate) typed_expr: NamePtr<'a>,
    pub(crate) explicit_: NamePtr<'a>,
    pub(crate) placeholder: NamePtr<'a>,
    pub(crate) zero: NamePtr<'a>,
    pub(crate) one: NamePtr<'a>,
    pub(crate) bit0: NamePtr<'a>,
    pub(crate) bit1: NamePtr<'a>,
    pub(crate) pp_uniq: NamePtr<'a>,
}

impl<'a> NameCache<'a> {
    /// Only used while constructing an environment; everything after that
    /// reaches the cache through `IsCtx::name_cache`.
    pub(crate) fn populate(dag: &mut TermDag<'a>, marker: DagMarker) -> Self {
        let mut str1 = |s: &'static str| {
            let sfx = match dag.strings.get_index_of(s) {
                Some(idx) => Ptr::from(marker, idx),
                None => Ptr::from(marker, dag.strings.insert_full(CowStr::Borrowed(s)).0),
            };
            let anon: NamePtr = Ptr::from(marker, 0);
            let hash = hash64!(crate::name::STR_HASH, anon, sfx);
            Ptr::from(marker, dag.names.insert_full(Name::Str(anon, sfx, hash)).0)
        };
        NameCache {
            have_: str1("have"),
            show_: str1("show"),
            let_: str1("let"),
            let_value: str1("let_value"),
            typed_expr: str1("typed_expr"),
            explicit_: str1("@"),
            placeholder: str1("_"),
            zero: str1("zero"),
            one: str1("one"),
            bit0: str1("bit0"),
            bit1: str1("bit1"),
            pp_uniq: str1("_pp_uniq"),
        }
    }
}

/// Read and allocation capabilities over the two-dag storage split. The
/// environment builder allocates into the persistent dag; a printing context
/// reads from both dags and allocates into its temporary one. Allocation is
/// hash-consing: re-allocating an already stored item returns the pointer to
/// the previously inserted element, checking the longer-lived storage first.
pub trait IsCtx<'a>: Sized {
    fn persistent_dag(&self) -> &TermDag<'a>;
    fn live_dag(&self) -> Option<&TermDag<'a>>;
    fn alloc_dag(&mut self) -> (&mut TermDag<'a>, DagMarker);
    fn name_cache(&self) -> &NameCache<'a>;
    /// Monotonic counter backing generated internal names; any two names made
    /// with `internal_name` are distinct for the lifetime of the context.
    fn next_unique(&mut self) -> u32;

    fn read_name(&self, p: NamePtr<'a>) -> Name<'a> {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().names.get_index(p.idx()).copied().unwrap(),
            DagMarker::Live => self.live_dag().unwrap().names.get_index(p.idx()).copied().unwrap(),
        }
    }

    fn read_level(&self, p: LevelPtr<'a>) -> Level<'a> {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().levels.get_index(p.idx()).copied().unwrap(),
            DagMarker::Live => self.live_dag().unwrap().levels.get_index(p.idx()).copied().unwrap(),
        }
    }

    /// Convenience function for reading two levels as a tuple.
    fn read_level_pair(&self, a: LevelPtr<'a>, b: LevelPtr<'a>) -> (Level<'a>, Level<'a>) {
        (self.read_level(a), self.read_level(b))
    }

    fn read_expr(&self, p: ExprPtr<'a>) -> Expr<'a> {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().exprs.get_index(p.idx()).copied().unwrap(),
            DagMarker::Live => self.live_dag().unwrap().exprs.get_index(p.idx()).copied().unwrap(),
        }
    }

    fn read_string(&self, p: StringPtr<'a>) -> &CowStr<'a> {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().strings.get_index(p.idx()).unwrap(),
            DagMarker::Live => self.live_dag().unwrap().strings.get_index(p.idx()).unwrap(),
        }
    }

    fn read_levels(&self, p: LevelsPtr<'a>) -> Arc<[LevelPtr<'a>]> {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().uparams.get_index(p.idx()).cloned().unwrap(),
            DagMarker::Live => self.live_dag().unwrap().uparams.get_index(p.idx()).cloned().unwrap(),
        }
    }

    fn read_exprs(&self, p: ExprsPtr<'a>) -> Arc<[ExprPtr<'a>]> {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().expr_lists.get_index(p.idx()).cloned().unwrap(),
            DagMarker::Live => self.live_dag().unwrap().expr_lists.get_index(p.idx()).cloned().unwrap(),
        }
    }

    fn read_bignum(&self, p: BigUintPtr<'a>) -> BigUint {
        match p.dag_marker() {
            DagMarker::Env => self.persistent_dag().bignums.get_index(p.idx()).cloned().unwrap(),
            DagMarker::Live => self.live_dag().unwrap().bignums.get_index(p.idx()).cloned().unwrap(),
        }
    }

    fn alloc_name(&mut self, n: Name<'a>) -> NamePtr<'a> {
        if let Some(idx) = self.persistent_dag().names.get_index_of(&n) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            Ptr::from(marker, dag.names.insert_full(n).0)
        }
    }

    fn alloc_level(&mut self, l: Level<'a>) -> LevelPtr<'a> {
        if let Some(idx) = self.persistent_dag().levels.get_index_of(&l) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            Ptr::from(marker, dag.levels.insert_full(l).0)
        }
    }

    fn alloc_expr(&mut self, e: Expr<'a>) -> ExprPtr<'a> {
        if let Some(idx) = self.persistent_dag().exprs.get_index_of(&e) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            Ptr::from(marker, dag.exprs.insert_full(e).0)
        }
    }

    fn alloc_string(&mut self, s: CowStr<'a>) -> StringPtr<'a> {
        if let Some(idx) = self.persistent_dag().strings.get_index_of(&s) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            Ptr::from(marker, dag.strings.insert_full(s).0)
        }
    }

    fn alloc_levels_slice(&mut self, ls: &[LevelPtr<'a>]) -> LevelsPtr<'a> {
        if let Some(idx) = self.persistent_dag().uparams.get_index_of(ls) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            match dag.uparams.get_index_of(ls) {
                Some(idx) => Ptr::from(marker, idx),
                None => Ptr::from(marker, dag.uparams.insert_full(Arc::from(ls)).0),
            }
        }
    }

    fn alloc_exprs_slice(&mut self, es: &[ExprPtr<'a>]) -> ExprsPtr<'a> {
        if let Some(idx) = self.persistent_dag().expr_lists.get_index_of(es) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            match dag.expr_lists.get_index_of(es) {
                Some(idx) => Ptr::from(marker, idx),
                None => Ptr::from(marker, dag.expr_lists.insert_full(Arc::from(es)).0),
            }
        }
    }

    fn alloc_bignum(&mut self, n: BigUint) -> BigUintPtr<'a> {
        if let Some(idx) = self.persistent_dag().bignums.get_index_of(&n) {
            Ptr::from(DagMarker::Env, idx)
        } else {
            let (dag, marker) = self.alloc_dag();
            Ptr::from(marker, dag.bignums.insert_full(n).0)
        }
    }

    /// A constructor for the anonymous name.
    fn anonymous(&self) -> NamePtr<'a> {
        debug_assert_eq!(self.persistent_dag().names.get_index(0).copied().unwrap(), Name::Anon);
        Ptr::from(DagMarker::Env, 0)
    }

    /// A constructor for level zero.
    fn zero(&self) -> LevelPtr<'a> {
        debug_assert_eq!(self.persistent_dag().levels.get_index(0).copied().unwrap(), Level::Zero);
        Ptr::from(DagMarker::Env, 0)
    }
}

/// The memory context used for a single pretty printer (and the type checker
/// it owns). Reads can reach both the environment's persistent dag and the
/// temporary dag; everything created while printing lands in the temporary
/// dag and is dropped with the context.
pub struct TermCtx<'t, 'p> {
    pub(crate) env: &'t Environment<'p>,
    pub(crate) dag: &'t mut TermDag<'t>,
    pub(crate) unique_counter: u32,
}

impl<'t, 'p: 't> TermCtx<'t, 'p> {
    pub fn new(env: &'t Environment<'p>, dag: &'t mut TermDag<'t>) -> Self {
        Self { env, dag, unique_counter: 0u32 }
    }

    pub fn env(&self) -> &'t Environment<'p> { self.env }

    pub fn with_tc<F, A>(&mut self, f: F) -> A
    where
        F: FnOnce(&mut TypeChecker<'_, 't, 'p>) -> A, {
        f(&mut TypeChecker::new(self))
    }

    pub fn with_pp<F, A>(&mut self, options: PpOptions, f: F) -> A
    where
        F: FnOnce(&mut PrettyPrinter<'_, 't, 'p>) -> A, {
        f(&mut PrettyPrinter::new(self, options))
    }
}

impl<'t, 'p: 't> IsCtx<'t> for TermCtx<'t, 'p> {
    fn persistent_dag(&self) -> &TermDag<'t> { &self.env.dag }

    fn live_dag(&self) -> Option<&TermDag<'t>> { Some(&*self.dag) }

    fn alloc_dag(&mut self) -> (&mut TermDag<'t>, DagMarker) { (&mut *self.dag, DagMarker::Live) }

    fn name_cache(&self) -> &NameCache<'t> { &self.env.name_cache }

    fn next_unique(&mut self) -> u32 {
        let out = self.unique_counter;
        self.unique_counter += 1;
        out
    }
}
