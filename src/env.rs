//! The read-only environment the printer consults: declarations, notation
//! entries indexed by head constant, the alias and hidden-name registries,
//! the active namespace list, the coercion registry, and the token
//! precedence table.
use crate::pretty_printer::{PpOptions, PrettyPrinter};
use num_bigint::BigUint;
use crate::util::{
    new_fx_hash_map, new_fx_index_map, BigUintPtr, CowStr, DagMarker, ExprPtr, FxHashMap, FxIndexMap, IsCtx,
    LevelsPtr, NameCache, NamePtr, Ptr, StringPtr, TermCtx, TermDag,
};
use std::sync::Arc;

pub type DeclarMap<'a> = FxIndexMap<NamePtr<'a>, Declar<'a>>;
pub type NotationIndex<'a> = FxHashMap<NamePtr<'a>, Vec<NotationEntry<'a>>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReducibilityHint {
    Opaq,
    Reg(u16),
    Abbrev,
}

#[derive(Debug, Clone, Copy)]
pub enum Declar<'a> {
    Axiom {
        name: NamePtr<'a>,
        uparams: LevelsPtr<'a>,
        type_: ExprPtr<'a>,
    },
    Definition {
        name: NamePtr<'a>,
        uparams: LevelsPtr<'a>,
        type_: ExprPtr<'a>,
        val: ExprPtr<'a>,
        hint: ReducibilityHint,
    },
    Theorem {
        name: NamePtr<'a>,
        uparams: LevelsPtr<'a>,
        type_: ExprPtr<'a>,
        val: ExprPtr<'a>,
    },
}

impl<'a> Declar<'a> {
    pub fn name(&self) -> NamePtr<'a> {
        match self {
            Declar::Axiom { name, .. } | Declar::Definition { name, .. } | Declar::Theorem { name, .. } => *name,
        }
    }

    pub fn uparams(&self) -> LevelsPtr<'a> {
        match self {
            Declar::Axiom { uparams, .. } | Declar::Definition { uparams, .. } | Declar::Theorem { uparams, .. } =>
                *uparams,
        }
    }

    pub fn type_(&self) -> ExprPtr<'a> {
        match self {
            Declar::Axiom { type_, .. } | Declar::Definition { type_, .. } | Declar::Theorem { type_, .. } => *type_,
        }
    }

    /// The unfoldable value, if this declaration has one the reducer may use.
    pub fn unfoldable_val(&self) -> Option<ExprPtr<'a>> {
        match self {
            Declar::Definition { val, hint, .. } if *hint != ReducibilityHint::Opaq => Some(*val),
            _ => None,
        }
    }
}

/// One step of a mixfix notation: a token plus an action prescribing what
/// (if any) subterm gets consumed after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Skip,
    Expr { rbp: u32 },
    Exprs,
    Binder,
    Binders,
    ScopedExpr,
    Ext,
    LuaExt,
}

#[derive(Debug, Clone, Copy)]
pub struct Transition<'a> {
    pub token: StringPtr<'a>,
    pub action: Action,
}

#[derive(Debug, Clone)]
pub struct NotationEntry<'a> {
    /// Entries are indexed by the head constant of their sample pattern.
    pub head: NamePtr<'a>,
    /// Prefix (null denotation) entries have no left operand; mixfix and
    /// postfix (left denotation) entries consume one.
    pub is_nud: bool,
    pub transitions: Arc<[Transition<'a>]>,
    /// The sample pattern the matcher runs against subterms; pattern
    /// variables are bound variables, indexed from the right.
    pub pattern: ExprPtr<'a>,
    /// Entries that print tokens outside ASCII are skipped when unicode
    /// output is disabled.
    pub safe_ascii: bool,
    /// Numeral entries render as the number itself.
    pub num: Option<BigUintPtr<'a>>,
}

impl<'a> NotationEntry<'a> {
    pub fn is_numeral(&self) -> bool { self.num.is_some() }
}

pub struct Environment<'p> {
    /// The persistent storage for `Name`, `Level`, and `Expr` items.
    pub(crate) dag: TermDag<'p>,
    pub declars: DeclarMap<'p>,
    pub(crate) notations: NotationIndex<'p>,
    /// Full name -> registered short alias.
    pub(crate) aliases: FxHashMap<NamePtr<'p>, NamePtr<'p>>,
    /// Hidden (private) name -> user-facing name.
    pub(crate) hidden_names: FxHashMap<NamePtr<'p>, NamePtr<'p>>,
    /// Active namespaces, innermost first.
    pub(crate) namespaces: Vec<NamePtr<'p>>,
    /// Registered coercion heads and the number of preamble arguments that
    /// precede the coerced argument.
    pub(crate) coercions: FxHashMap<NamePtr<'p>, u16>,
    pub(crate) token_precs: FxHashMap<StringPtr<'p>, u32>,
    /// Whether `Prop` is a distinguished sort.
    pub(crate) impredicative: bool,
    pub(crate) name_cache: NameCache<'p>,
}

const NO_ENTRIES: &[NotationEntry<'static>] = &[];

/// Pointers handed to the environment's query methods often come from a
/// shorter-lived printing context; lookups only need the index and dag
/// marker, so re-tag the pointer with the environment's own lifetime.
fn rekey<A, B>(p: Ptr<A>) -> Ptr<B> { Ptr::from(p.dag_marker(), p.idx()) }

impl<'p> Environment<'p> {
    pub fn get_declar(&self, n: NamePtr<'_>) -> Option<&Declar<'p>> {
        let key: NamePtr<'p> = rekey(n);
        self.declars.get(&key)
    }

    /// Whether any declaration with this name exists; the alias shadowing
    /// check wants existence only.
    pub fn contains(&self, n: NamePtr<'_>) -> bool {
        let key: NamePtr<'p> = rekey(n);
        self.declars.contains_key(&key)
    }

    pub fn notation_entries(&self, head: NamePtr<'_>) -> &[NotationEntry<'p>] {
        let key: NamePtr<'p> = rekey(head);
        self.notations.get(&key).map(|v| v.as_slice()).unwrap_or(NO_ENTRIES)
    }

    pub fn is_coercion(&self, n: NamePtr<'_>) -> Option<u16> {
        let key: NamePtr<'p> = rekey(n);
        self.coercions.get(&key).copied()
    }

    pub fn alias_of(&self, n: NamePtr<'_>) -> Option<NamePtr<'p>> {
        let key: NamePtr<'p> = rekey(n);
        self.aliases.get(&key).copied()
    }

    pub fn hidden_to_user(&self, n: NamePtr<'_>) -> Option<NamePtr<'p>> {
        let key: NamePtr<'p> = rekey(n);
        self.hidden_names.get(&key).copied()
    }

    pub fn namespaces(&self) -> &[NamePtr<'p>] { self.namespaces.as_slice() }

    pub fn token_prec(&self, token: StringPtr<'_>) -> Option<u32> {
        let key: StringPtr<'p> = rekey(token);
        self.token_precs.get(&key).copied()
    }

    pub fn impredicative(&self) -> bool { self.impredicative }

    pub fn with_ctx<F, A>(&self, f: F) -> A
    where
        F: FnOnce(&mut TermCtx<'_, 'p>) -> A, {
        let mut dag = TermDag::new();
        let mut ctx = TermCtx::new(self, &mut dag);
        f(&mut ctx)
    }

    pub fn with_pp<F, A>(&self, options: PpOptions, f: F) -> A
    where
        F: FnOnce(&mut PrettyPrinter<'_, '_, 'p>) -> A, {
        self.with_ctx(|ctx| ctx.with_pp(options, f))
    }
}

/// Programmatic producer of the read-only `Environment`. Everything it
/// allocates lands in the persistent dag, so pointers created here stay
/// valid for every printing context opened against the finished environment.
pub struct EnvBuilder<'p> {
    dag: TermDag<'p>,
    name_cache: NameCache<'p>,
    declars: DeclarMap<'p>,
    notations: NotationIndex<'p>,
    aliases: FxHashMap<NamePtr<'p>, NamePtr<'p>>,
    hidden_names: FxHashMap<NamePtr<'p>, NamePtr<'p>>,
    namespaces: Vec<NamePtr<'p>>,
    coercions: FxHashMap<NamePtr<'p>, u16>,
    token_precs: FxHashMap<StringPtr<'p>, u32>,
    impredicative: bool,
    unique_counter: u32,
}

impl<'p> EnvBuilder<'p> {
    pub fn new() -> Self {
        let mut dag = TermDag::new();
        let name_cache = NameCache::populate(&mut dag, DagMarker::Env);
        Self {
            dag,
            name_cache,
            declars: new_fx_index_map(),
            notations: new_fx_hash_map(),
            aliases: new_fx_hash_map(),
            hidden_names: new_fx_hash_map(),
            namespaces: Vec::new(),
            coercions: new_fx_hash_map(),
            token_precs: new_fx_hash_map(),
            impredicative: true,
            unique_counter: 0u32,
        }
    }

    pub fn add_axiom(&mut self, name: NamePtr<'p>, uparams: LevelsPtr<'p>, type_: ExprPtr<'p>) {
        self.declars.insert(name, Declar::Axiom { name, uparams, type_ });
    }

    pub fn add_definition(
        &mut self,
        name: NamePtr<'p>,
        uparams: LevelsPtr<'p>,
        type_: ExprPtr<'p>,
        val: ExprPtr<'p>,
    ) {
        self.declars.insert(name, Declar::Definition { name, uparams, type_, val, hint: ReducibilityHint::Reg(1) });
    }

    pub fn add_theorem(&mut self, name: NamePtr<'p>, uparams: LevelsPtr<'p>, type_: ExprPtr<'p>, val: ExprPtr<'p>) {
        self.declars.insert(name, Declar::Theorem { name, uparams, type_, val });
    }

    pub fn add_notation(&mut self, entry: NotationEntry<'p>) {
        self.notations.entry(entry.head).or_default().push(entry);
    }

    /// Register a token's precedence in the token table.
    pub fn set_token_prec(&mut self, token: &'static str, prec: u32) {
        let token = self.alloc_string(CowStr::Borrowed(token));
        self.token_precs.insert(token, prec);
    }

    pub fn intern_token(&mut self, token: &'static str) -> StringPtr<'p> {
        self.alloc_string(CowStr::Borrowed(token))
    }

    /// Full name -> alias, e.g. `Nat.add -> add`.
    pub fn add_alias(&mut self, full: NamePtr<'p>, alias: NamePtr<'p>) { self.aliases.insert(full, alias); }

    pub fn add_hidden_name(&mut self, hidden: NamePtr<'p>, user: NamePtr<'p>) {
        self.hidden_names.insert(hidden, user);
    }

    /// Activate a namespace; later pushes are treated as innermost.
    pub fn push_namespace(&mut self, ns: NamePtr<'p>) { self.namespaces.insert(0, ns); }

    /// Register `name` as a coercion whose coerced argument sits after
    /// `arity` preamble arguments.
    pub fn add_coercion(&mut self, name: NamePtr<'p>, arity: u16) { self.coercions.insert(name, arity); }

    pub fn set_impredicative(&mut self, b: bool) { self.impredicative = b; }

    /// Register `head` as a binary infix operator `a <token> b` at the given
    /// precedence.
    pub fn add_infix(&mut self, head: NamePtr<'p>, token: &'static str, prec: u32) {
        self.set_token_prec(token, prec);
        let tok = self.intern_token(token);
        let levels = self.alloc_levels_slice(&[]);
        let c = ExprPtr::new_const(head, levels, self);
        let v1 = ExprPtr::new_var(1, self);
        let v0 = ExprPtr::new_var(0, self);
        let pattern = c.new_app(v1, self).new_app(v0, self);
        let transitions: Arc<[Transition<'p>]> =
            Arc::from(vec![Transition { token: tok, action: Action::Expr { rbp: prec } }]);
        self.add_notation(NotationEntry {
            head,
            is_nud: false,
            transitions,
            pattern,
            safe_ascii: token.is_ascii(),
            num: None,
        });
    }

    /// Register `head` as a prefix operator `<token> a`.
    pub fn add_prefix(&mut self, head: NamePtr<'p>, token: &'static str, prec: u32) {
        self.set_token_prec(token, prec);
        let tok = self.intern_token(token);
        let levels = self.alloc_levels_slice(&[]);
        let c = ExprPtr::new_const(head, levels, self);
        let v0 = ExprPtr::new_var(0, self);
        let pattern = c.new_app(v0, self);
        let transitions: Arc<[Transition<'p>]> =
            Arc::from(vec![Transition { token: tok, action: Action::Expr { rbp: prec } }]);
        self.add_notation(NotationEntry {
            head,
            is_nud: true,
            transitions,
            pattern,
            safe_ascii: token.is_ascii(),
            num: None,
        });
    }

    /// Register `head` as a postfix operator `a <token>`.
    pub fn add_postfix(&mut self, head: NamePtr<'p>, token: &'static str, prec: u32) {
        self.set_token_prec(token, prec);
        let tok = self.intern_token(token);
        let levels = self.alloc_levels_slice(&[]);
        let c = ExprPtr::new_const(head, levels, self);
        let v0 = ExprPtr::new_var(0, self);
        let pattern = c.new_app(v0, self);
        let transitions: Arc<[Transition<'p>]> =
            Arc::from(vec![Transition { token: tok, action: Action::Skip }]);
        self.add_notation(NotationEntry {
            head,
            is_nud: false,
            transitions,
            pattern,
            safe_ascii: token.is_ascii(),
            num: None,
        });
    }

    /// Register a numeral entry: any term matching `pattern` (whose head
    /// constant is `head`) renders as `value`.
    pub fn add_numeral(&mut self, head: NamePtr<'p>, pattern: ExprPtr<'p>, value: BigUint) {
        let num = Some(self.alloc_bignum(value));
        let transitions: Arc<[Transition<'p>]> = Arc::from(Vec::new());
        self.add_notation(NotationEntry { head, is_nud: true, transitions, pattern, safe_ascii: true, num });
    }

    pub fn finish(self) -> Environment<'p> {
        Environment {
            dag: self.dag,
            declars: self.declars,
            notations: self.notations,
            aliases: self.aliases,
            hidden_names: self.hidden_names,
            namespaces: self.namespaces,
            coercions: self.coercions,
            token_precs: self.token_precs,
            impredicative: self.impredicative,
            name_cache: self.name_cache,
        }
    }
}

impl<'p> Default for EnvBuilder<'p> {
    fn default() -> Self { Self::new() }
}

impl<'p> IsCtx<'p> for EnvBuilder<'p> {
    fn persistent_dag(&self) -> &TermDag<'p> { &self.dag }

    fn live_dag(&self) -> Option<&TermDag<'p>> { None }

    fn alloc_dag(&mut self) -> (&mut TermDag<'p>, DagMarker) { (&mut self.dag, DagMarker::Env) }

    fn name_cache(&self) -> &NameCache<'p> { &self.name_cache }

    fn next_unique(&mut self) -> u32 {
        let out = self.unique_counter;
        self.unique_counter += 1;
        out
    }
}
