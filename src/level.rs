//! Implementation of the `Level` type representing universes
use crate::hash64;
use crate::util::{IsCtx, LevelPtr, LevelsPtr, NamePtr};

pub(crate) const ZERO_HASH: u64 = 283;
pub(crate) const SUCC_HASH: u64 = 541;
pub(crate) const MAX_HASH: u64 = 1091;
pub(crate) const IMAX_HASH: u64 = 1747;
pub(crate) const PARAM_HASH: u64 = 947;
pub(crate) const META_HASH: u64 = 571;
use Level::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level<'a> {
    Zero,
    Succ(LevelPtr<'a>, u64),
    Max(LevelPtr<'a>, LevelPtr<'a>, u64),
    IMax(LevelPtr<'a>, LevelPtr<'a>, u64),
    Param(NamePtr<'a>, u64),
    Meta(NamePtr<'a>, u64),
}

impl<'a> Level<'a> {
    fn get_hash(&self) -> u64 {
        match self {
            Zero => ZERO_HASH,
            Succ(.., hash) | Max(.., hash) | IMax(.., hash) | Param(.., hash) | Meta(.., hash) => *hash,
        }
    }
}

impl<'a> std::hash::Hash for Level<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

impl<'a> LevelPtr<'a> {
    pub fn new_succ(self, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
        let hash = hash64!(SUCC_HASH, self);
        ctx.alloc_level(Succ(self, hash))
    }

    pub fn new_max(self, r: LevelPtr<'a>, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
        let hash = hash64!(MAX_HASH, self, r);
        ctx.alloc_level(Max(self, r, hash))
    }

    pub fn new_imax(self, r: LevelPtr<'a>, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
        let hash = hash64!(IMAX_HASH, self, r);
        ctx.alloc_level(IMax(self, r, hash))
    }

    pub fn is_zero_lit(self, ctx: &impl IsCtx<'a>) -> bool { matches!(ctx.read_level(self), Zero) }

    pub fn is_any_max(self, ctx: &impl IsCtx<'a>) -> bool { matches!(ctx.read_level(self), Max(..) | IMax(..)) }

    /// Does this level contain a universe metavariable anywhere.
    pub fn has_meta(self, ctx: &impl IsCtx<'a>) -> bool {
        match ctx.read_level(self) {
            Zero | Param(..) => false,
            Meta(..) => true,
            Succ(pred, ..) => pred.has_meta(ctx),
            Max(l, r, ..) | IMax(l, r, ..) => l.has_meta(ctx) || r.has_meta(ctx),
        }
    }

    /// Strip the leading spine of `Succ` applications, returning the innermost
    /// level and the number of applications stripped.
    pub fn succ_offset(self, ctx: &impl IsCtx<'a>) -> (LevelPtr<'a>, usize) {
        let mut l = self;
        let mut num_succs = 0usize;
        while let Succ(pred, ..) = ctx.read_level(l) {
            l = pred;
            num_succs += 1;
        }
        (l, num_succs)
    }

    fn combining(self, r: LevelPtr<'a>, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
        match ctx.read_level_pair(self, r) {
            (Zero, _) => r,
            (_, Zero) => self,
            (Succ(l, ..), Succ(r, ..)) => {
                let pred = l.combining(r, ctx);
                pred.new_succ(ctx)
            }
            _ => self.new_max(r, ctx),
        }
    }

    pub fn simplify(self, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
        match ctx.read_level(self) {
            Zero | Param(..) | Meta(..) => self,
            Succ(val, ..) => {
                let val = val.simplify(ctx);
                val.new_succ(ctx)
            }
            Max(l, r, ..) => {
                let l = l.simplify(ctx);
                let r = r.simplify(ctx);
                l.combining(r, ctx)
            }
            IMax(l, r, ..) => {
                let r_simp = r.simplify(ctx);
                match ctx.read_level(r_simp) {
                    Zero => r_simp,
                    Succ { .. } => {
                        let l_simp = l.simplify(ctx);
                        l_simp.combining(r_simp, ctx)
                    }
                    _ => {
                        let l_simp = l.simplify(ctx);
                        l_simp.new_imax(r_simp, ctx)
                    }
                }
            }
        }
    }

    /// Return `self [ks |-> vs]` for parallel lists of parameters and values.
    pub fn subst_params(self, ks: &[LevelPtr<'a>], vs: &[LevelPtr<'a>], ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
        match ctx.read_level(self) {
            Zero | Meta(..) => self,
            Succ(val, ..) => {
                let val = val.subst_params(ks, vs, ctx);
                val.new_succ(ctx)
            }
            Max(l, r, ..) => {
                let l_prime = l.subst_params(ks, vs, ctx);
                let r_prime = r.subst_params(ks, vs, ctx);
                l_prime.new_max(r_prime, ctx)
            }
            IMax(l, r, ..) => {
                let l_prime = l.subst_params(ks, vs, ctx);
                let r_prime = r.subst_params(ks, vs, ctx);
                l_prime.new_imax(r_prime, ctx)
            }
            Param(..) => {
                for (k, v) in ks.iter().copied().zip(vs.iter().copied()) {
                    if self == k {
                        return v
                    }
                }
                self
            }
        }
    }
}

pub fn mk_param<'a>(n: NamePtr<'a>, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
    let hash = hash64!(PARAM_HASH, n);
    ctx.alloc_level(Param(n, hash))
}

pub fn mk_meta_level<'a>(n: NamePtr<'a>, ctx: &mut impl IsCtx<'a>) -> LevelPtr<'a> {
    let hash = hash64!(META_HASH, n);
    ctx.alloc_level(Meta(n, hash))
}

/// The wildcard pattern level used in notation entries; matches any level
/// when universe display is off.
pub fn is_placeholder_level<'a>(l: LevelPtr<'a>, ctx: &impl IsCtx<'a>) -> bool {
    match ctx.read_level(l) {
        Param(n, ..) => n == ctx.name_cache().placeholder,
        _ => false,
    }
}
