//! Implementation of the `Name` type (hierarchical names)
use crate::hash64;
use crate::util::{CowStr, IsCtx, NamePtr, StringPtr};
use Name::*;

pub(crate) const ANON_HASH: u64 = 43;
pub(crate) const STR_HASH: u64 = 911;
pub(crate) const NUM_HASH: u64 = 103;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Name<'a> {
    Anon,
    Str(NamePtr<'a>, StringPtr<'a>, u64),
    Num(NamePtr<'a>, u64, u64),
}

impl<'a> std::hash::Hash for Name<'a> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) { state.write_u64(self.get_hash()) }
}

impl<'a> Name<'a> {
    fn get_hash(&self) -> u64 {
        match self {
            Anon => ANON_HASH,
            Str(.., hash) | Num(.., hash) => *hash,
        }
    }
}

impl<'a> NamePtr<'a> {
    pub fn str(self, sfx: StringPtr<'a>, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
        let hash = hash64!(STR_HASH, self, sfx);
        ctx.alloc_name(Str(self, sfx, hash))
    }

    pub fn num(self, sfx: u64, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
        let hash = hash64!(NUM_HASH, self, sfx);
        ctx.alloc_name(Num(self, sfx, hash))
    }

    pub fn is_anon(self, ctx: &impl IsCtx<'a>) -> bool { ctx.read_name(self) == Anon }

    /// Append `idx` to the final string segment of a name, or as a new segment
    /// if the name does not end with a string segment. This is how the purifier
    /// produces `x1, x2, ...` from a suggestion `x`.
    pub fn append_index_after(self, idx: u64, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
        match ctx.read_name(self) {
            Str(pfx, sfx, ..) => {
                let s = ctx.read_string(sfx).clone();
                let s = ctx.alloc_string(CowStr::Owned(format!("{}{}", s, idx)));
                pfx.str(s, ctx)
            }
            _ => {
                let s = ctx.alloc_string(CowStr::Owned(format!("{}", idx)));
                self.str(s, ctx)
            }
        }
    }

    /// Rewrite occurrences of the prefix `outgoing` with `incoming`; used for
    /// stripping active-namespace prefixes (`incoming` anonymous) and for
    /// hidden-name resolution.
    pub fn replace_pfx(self, outgoing: NamePtr<'a>, incoming: NamePtr<'a>, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
        match ctx.read_name(self) {
            Anon => match ctx.read_name(outgoing) {
                Anon => incoming,
                _ => ctx.anonymous(),
            },
            Str(..) | Num(..) if self == outgoing => incoming,
            Str(pfx, sfx, ..) => {
                let pfx = pfx.replace_pfx(outgoing, incoming, ctx);
                pfx.str(sfx, ctx)
            }
            Num(pfx, sfx, ..) => {
                let pfx = pfx.replace_pfx(outgoing, incoming, ctx);
                pfx.num(sfx, ctx)
            }
        }
    }

    /// Whether `pfx` is a (strict or non-strict) leading segment sequence of `self`.
    pub fn has_pfx(self, pfx: NamePtr<'a>, ctx: &impl IsCtx<'a>) -> bool {
        if self == pfx {
            return true
        }
        match ctx.read_name(self) {
            Anon => pfx.is_anon(ctx),
            Str(p, ..) | Num(p, ..) => p.has_pfx(pfx, ctx),
        }
    }

    /// The number of segments in a name.
    pub fn segments(self, ctx: &impl IsCtx<'a>) -> usize {
        match ctx.read_name(self) {
            Anon => 0,
            Str(pfx, ..) | Num(pfx, ..) => 1 + pfx.segments(ctx),
        }
    }

    pub fn concat(self, other: NamePtr<'a>, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
        match ctx.read_name(other) {
            Anon => self,
            Str(pfx, sfx, ..) => {
                let pfx = self.concat(pfx, ctx);
                pfx.str(sfx, ctx)
            }
            Num(pfx, sfx, ..) => {
                let pfx = self.concat(pfx, ctx);
                pfx.num(sfx, ctx)
            }
        }
    }

    /// Create a string from a name, with dot separators between segments.
    ///
    /// Example: `to_display_string(Foo.Bar.Baz) == "Foo.Bar.Baz"`
    pub fn to_display_string(self, ctx: &impl IsCtx<'a>) -> String {
        match ctx.read_name(self) {
            Anon => String::new(),
            Str(pfx, sfx, _) => {
                let mut out = pfx.to_display_string(ctx);
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(ctx.read_string(sfx).as_ref());
                out
            }
            Num(pfx, sfx, _) => {
                let mut out = pfx.to_display_string(ctx);
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(format!("{}", sfx).as_str());
                out
            }
        }
    }
}

/// Parse a dot-separated string as a `Name`. For any given name segment, if it
/// parses as a u64, it will be treated as coming from the `Num` constructor,
/// otherwise the `Str` constructor.
pub fn name_from_str<'a>(s: &str, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
    let mut out = ctx.anonymous();
    for segment in s.split('.') {
        if let Ok(n) = segment.parse::<u64>() {
            out = out.num(n, ctx)
        } else {
            let sfx = ctx.alloc_string(CowStr::Owned(segment.to_string()));
            out = out.str(sfx, ctx);
        }
    }
    out
}

pub fn str1<'a>(s: &'static str, ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
    let anon = ctx.anonymous();
    let sfx = ctx.alloc_string(CowStr::Borrowed(s));
    anon.str(sfx, ctx)
}

/// A generated internal name, unique for the lifetime of the context; the
/// suggestion-tracking in the printer turns these into user-visible names.
pub(crate) fn internal_name<'a>(ctx: &mut impl IsCtx<'a>) -> NamePtr<'a> {
    let idx = ctx.next_unique();
    let base = ctx.name_cache().pp_uniq;
    base.num(idx as u64, ctx)
}
