//! Index-permutation symbol tables and the small symbolic algebra needed to
//! build pseudo-inverses.
//!
//! A [`SymbolTable`] assigns one symbol to every multiset of Voigt indices:
//! `C_1121`, `C_1211` and `C_2111` all share a symbol. Symbols are numbered in
//! combinations-with-replacement order (lexicographic on sorted tuples), and
//! that order fixes the column layout of every matrix built downstream.
//!
//! Expressions are linear in the symbols with polynomial coefficients in a
//! single scalar parameter, which is all that differentiation of a
//! strain-power expansion requires.

use crate::error::{Error, Result};
use crate::tensor::{flatten, unflatten};
use num_traits::Zero;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::Add;

pub type SymbolId = usize;

/// Symbols of a fully index-symmetric array of rank `rank` over `dim` values.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolTable {
    rank: usize,
    dim: usize,
    symbols: Vec<Vec<usize>>,
    array: Vec<SymbolId>,
}

/// Enumerates the independent components of a rank-`rank` array whose
/// entries are invariant under any permutation of their indices.
pub fn build_symbol_table(rank: usize, dim: usize) -> Result<SymbolTable> {
    if dim == 0 {
        return Err(Error::InvalidInput(
            "symbol table dimension must be positive".to_string(),
        ));
    }
    let mut symbols = Vec::new();
    let mut array = vec![0; dim.pow(rank as u32)];
    let mut tuple = vec![0usize; rank];
    loop {
        let id = symbols.len();
        let mut perm = tuple.clone();
        loop {
            array[flatten(&perm, dim)] = id;
            if !next_permutation(&mut perm) {
                break;
            }
        }
        symbols.push(tuple.clone());
        if !next_combination(&mut tuple, dim) {
            break;
        }
    }
    Ok(SymbolTable {
        rank,
        dim,
        symbols,
        array,
    })
}

/// Next non-decreasing tuple over `0..dim`; false after the last one.
fn next_combination(tuple: &mut [usize], dim: usize) -> bool {
    match tuple.iter().rposition(|&v| v + 1 < dim) {
        Some(pos) => {
            let next = tuple[pos] + 1;
            for v in &mut tuple[pos..] {
                *v = next;
            }
            true
        }
        None => false,
    }
}

/// Lexicographic next permutation; false once the sequence is descending.
fn next_permutation(seq: &mut [usize]) -> bool {
    if seq.len() < 2 {
        return false;
    }
    let Some(i) = (0..seq.len() - 1).rev().find(|&i| seq[i] < seq[i + 1]) else {
        return false;
    };
    let j = (i + 1..seq.len())
        .rev()
        .find(|&j| seq[j] > seq[i])
        .unwrap_or(i + 1);
    seq.swap(i, j);
    seq[i + 1..].reverse();
    true
}

impl SymbolTable {
    pub fn rank(&self) -> usize {
        self.rank
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of independent symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Canonical (sorted) index tuple of every symbol, in symbol order.
    pub fn symbols(&self) -> &[Vec<usize>] {
        &self.symbols
    }

    /// Dense row-major array of symbol IDs, `dim^rank` entries.
    pub fn array(&self) -> &[SymbolId] {
        &self.array
    }

    /// Display name such as `c_0123`.
    pub fn name(&self, id: SymbolId) -> String {
        let digits: String = self.symbols[id].iter().map(|i| i.to_string()).collect();
        format!("c_{digits}")
    }

    pub fn symbol_at(&self, index: &[usize]) -> SymbolId {
        self.array[flatten(index, self.dim)]
    }

    /// Symbol of an index tuple given in any order.
    pub fn id_of(&self, index: &[usize]) -> Option<SymbolId> {
        if index.len() != self.rank || index.iter().any(|&i| i >= self.dim) {
            return None;
        }
        let mut sorted = index.to_vec();
        sorted.sort_unstable();
        self.symbols.binary_search(&sorted).ok()
    }

    /// Replaces every placeholder with its value from `values`.
    pub fn substitute(&self, values: &HashMap<SymbolId, f64>) -> Result<Vec<f64>> {
        let mut resolved = Vec::with_capacity(self.symbols.len());
        for id in 0..self.symbols.len() {
            match values.get(&id) {
                Some(v) => resolved.push(*v),
                None => return Err(Error::MissingSymbol(self.name(id))),
            }
        }
        Ok(self.array.iter().map(|&id| resolved[id]).collect())
    }

    /// Like [`SymbolTable::substitute`] with values given in symbol order.
    pub fn substitute_ordered(&self, values: &[f64]) -> Result<Vec<f64>> {
        if values.len() < self.symbols.len() {
            return Err(Error::MissingSymbol(self.name(values.len())));
        }
        Ok(self.array.iter().map(|&id| values[id]).collect())
    }

    /// Iterates `(index tuple, symbol)` over the dense array.
    pub fn entries(&self) -> impl Iterator<Item = (Vec<usize>, SymbolId)> + '_ {
        self.array.iter().enumerate().map(move |(flat, &id)| {
            let mut index = vec![0usize; self.rank];
            unflatten(flat, self.dim, &mut index);
            (index, id)
        })
    }
}

/// Polynomial in one scalar parameter: `coeffs[k] * s^k`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Polynomial {
    coeffs: Vec<f64>,
}

impl Polynomial {
    pub fn constant(value: f64) -> Self {
        Self::monomial(value, 0)
    }

    pub fn monomial(coeff: f64, degree: usize) -> Self {
        if coeff == 0.0 {
            return Self::default();
        }
        let mut coeffs = vec![0.0; degree + 1];
        coeffs[degree] = coeff;
        Self { coeffs }
    }

    pub fn coeff(&self, degree: usize) -> f64 {
        self.coeffs.get(degree).copied().unwrap_or(0.0)
    }

    /// Degree of the highest nonzero term; `None` for the zero polynomial.
    pub fn degree(&self) -> Option<usize> {
        self.coeffs.iter().rposition(|&c| c != 0.0)
    }

    pub fn scale(&self, factor: f64) -> Self {
        let mut out = Self {
            coeffs: self.coeffs.iter().map(|c| c * factor).collect(),
        };
        out.trim();
        out
    }

    pub fn derivative(&self) -> Self {
        let mut out = Self {
            coeffs: self
                .coeffs
                .iter()
                .enumerate()
                .skip(1)
                .map(|(k, c)| c * k as f64)
                .collect(),
        };
        out.trim();
        out
    }

    pub fn nth_derivative(&self, n: usize) -> Self {
        (0..n).fold(self.clone(), |p, _| p.derivative())
    }

    pub fn eval(&self, s: f64) -> f64 {
        self.coeffs.iter().rev().fold(0.0, |acc, c| acc * s + c)
    }

    fn trim(&mut self) {
        while self.coeffs.last() == Some(&0.0) {
            self.coeffs.pop();
        }
    }
}

impl Add for Polynomial {
    type Output = Polynomial;
    fn add(self, rhs: Polynomial) -> Polynomial {
        let len = self.coeffs.len().max(rhs.coeffs.len());
        let mut out = Polynomial {
            coeffs: (0..len).map(|k| self.coeff(k) + rhs.coeff(k)).collect(),
        };
        out.trim();
        out
    }
}

impl Zero for Polynomial {
    fn zero() -> Self {
        Self::default()
    }
    fn is_zero(&self) -> bool {
        self.coeffs.iter().all(|&c| c == 0.0)
    }
}

/// Linear combination of symbols with polynomial coefficients.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinearExpr {
    terms: BTreeMap<SymbolId, Polynomial>,
}

impl LinearExpr {
    pub fn symbol(id: SymbolId) -> Self {
        let mut expr = Self::default();
        expr.add_term(id, Polynomial::constant(1.0));
        expr
    }

    /// Adds `coeff * symbol`; terms that cancel are dropped.
    pub fn add_term(&mut self, id: SymbolId, coeff: Polynomial) {
        if coeff.is_zero() {
            return;
        }
        let sum = match self.terms.remove(&id) {
            Some(existing) => existing + coeff,
            None => coeff,
        };
        if !sum.is_zero() {
            self.terms.insert(id, sum);
        }
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map_coeffs(|p| p.scale(factor))
    }

    pub fn nth_derivative(&self, n: usize) -> Self {
        self.map_coeffs(|p| p.nth_derivative(n))
    }

    /// Coefficient polynomial of `id` (zero if absent).
    pub fn coefficient(&self, id: SymbolId) -> Polynomial {
        self.terms.get(&id).cloned().unwrap_or_default()
    }

    pub fn symbols_present(&self) -> BTreeSet<SymbolId> {
        self.terms.keys().copied().collect()
    }

    /// Value at parameter `s` with numeric symbol values in symbol order.
    pub fn evaluate(&self, s: f64, values: &[f64]) -> Result<f64> {
        let mut total = 0.0;
        for (&id, poly) in &self.terms {
            let value = values
                .get(id)
                .ok_or_else(|| Error::MissingSymbol(format!("#{id}")))?;
            total += value * poly.eval(s);
        }
        Ok(total)
    }

    fn map_coeffs(&self, f: impl Fn(&Polynomial) -> Polynomial) -> Self {
        let mut out = Self::default();
        for (&id, poly) in &self.terms {
            out.add_term(id, f(poly));
        }
        out
    }
}

impl Add for LinearExpr {
    type Output = LinearExpr;
    fn add(mut self, rhs: LinearExpr) -> LinearExpr {
        for (id, poly) in rhs.terms {
            self.add_term(id, poly);
        }
        self
    }
}

impl Zero for LinearExpr {
    fn zero() -> Self {
        Self::default()
    }
    fn is_zero(&self) -> bool {
        self.terms.is_empty()
    }
}
