use std::fmt::Debug;

use num_traits::{AsPrimitive, PrimInt, cast, one, zero};

pub trait MappingStore: Clone + Default {
    type Src;
    type Dst;
    fn topit(&mut self, left: usize, right: usize);
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    fn has(&self, src: &Self::Src, dst: &Self::Dst) -> bool;
    fn link(&mut self, src: Self::Src, dst: Self::Dst);
    fn cut(&mut self, src: Self::Src, dst: Self::Dst);
    fn is_src(&self, src: &Self::Src) -> bool;
    fn is_dst(&self, dst: &Self::Dst) -> bool;
}

pub trait MonoMappingStore: MappingStore {
    type Iter<'a>: Iterator<Item = (Self::Src, Self::Dst)>
    where
        Self: 'a;
    fn get_src(&self, dst: &Self::Dst) -> Option<Self::Src>;
    fn get_dst(&self, src: &Self::Src) -> Option<Self::Dst>;
    fn link_if_both_unmapped(&mut self, t1: Self::Src, t2: Self::Dst) -> bool;
    fn iter(&self) -> Self::Iter<'_>;
}

/// Dense one-to-one store, entries are offset by one so that zero means unmapped.
#[derive(Debug, Clone)]
pub struct VecStore<T> {
    pub src_to_dst: Vec<T>,
    pub dst_to_src: Vec<T>,
}

impl<T> Default for VecStore<T> {
    fn default() -> Self {
        Self {
            src_to_dst: Default::default(),
            dst_to_src: Default::default(),
        }
    }
}

impl<T: PrimInt + AsPrimitive<usize> + Debug> MappingStore for VecStore<T> {
    type Src = T;
    type Dst = T;

    fn len(&self) -> usize {
        self.src_to_dst.iter().filter(|x| **x != zero()).count()
    }

    fn link(&mut self, src: T, dst: T) {
        self.src_to_dst[src.as_()] = dst + one();
        self.dst_to_src[dst.as_()] = src + one();
    }

    fn cut(&mut self, src: T, dst: T) {
        self.src_to_dst[src.as_()] = zero();
        self.dst_to_src[dst.as_()] = zero();
    }

    fn is_src(&self, src: &T) -> bool {
        self.src_to_dst
            .get(src.as_())
            .is_some_and(|x| *x != zero())
    }

    fn is_dst(&self, dst: &T) -> bool {
        self.dst_to_src
            .get(dst.as_())
            .is_some_and(|x| *x != zero())
    }

    fn topit(&mut self, left: usize, right: usize) {
        self.src_to_dst.resize(left + 1, zero());
        self.dst_to_src.resize(right + 1, zero());
    }

    fn has(&self, src: &T, dst: &T) -> bool {
        self.src_to_dst.get(src.as_()) == Some(&(*dst + one()))
            && self.dst_to_src.get(dst.as_()) == Some(&(*src + one()))
    }
}

impl<T: PrimInt + AsPrimitive<usize> + Debug> MonoMappingStore for VecStore<T> {
    type Iter<'a>
        = MonoIter<'a, T>
    where
        Self: 'a;

    fn get_src(&self, dst: &T) -> Option<T> {
        self.dst_to_src
            .get(dst.as_())
            .filter(|x| **x != zero())
            .map(|x| *x - one())
    }

    fn get_dst(&self, src: &T) -> Option<T> {
        self.src_to_dst
            .get(src.as_())
            .filter(|x| **x != zero())
            .map(|x| *x - one())
    }

    fn link_if_both_unmapped(&mut self, t1: T, t2: T) -> bool {
        if !self.is_src(&t1) && !self.is_dst(&t2) {
            self.link(t1, t2);
            true
        } else {
            false
        }
    }

    fn iter(&self) -> Self::Iter<'_> {
        MonoIter {
            v: self.src_to_dst.iter().enumerate(),
        }
    }
}

pub struct MonoIter<'a, T: 'a> {
    v: std::iter::Enumerate<core::slice::Iter<'a, T>>,
}

impl<T: PrimInt> Iterator for MonoIter<'_, T> {
    type Item = (T, T);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let (i, x) = self.v.next()?;
            if *x != zero() {
                if let Some(i) = cast::<usize, T>(i) {
                    return Some((i, *x - one()));
                }
            }
        }
    }
}
