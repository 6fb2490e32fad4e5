//! Einstein summation over dense [`Tensor`]s.
//!
//! Subscript strings follow the usual convention: `"ijpq,pqrs->ijrs"` names every axis of
//! every operand with a letter, repeated letters are summed, and the output
//! letters are listed after `->`. Without `->` the output is every letter that
//! appears exactly once, in alphabetical order.
//!
//! Operands are contracted pairwise, always picking the pair that shares the
//! most labels, so that wide products such as the fourth-order compliance
//! terms never materialize an intermediate larger than necessary.

use crate::error::{Error, Result};
use crate::tensor::{flatten, Tensor, DIM};

struct Term {
    labels: Vec<char>,
    tensor: Tensor,
}

pub fn einsum(subscripts: &str, operands: &[&Tensor]) -> Result<Tensor> {
    let (inputs, output) = parse_subscripts(subscripts)?;
    if inputs.len() != operands.len() {
        return Err(Error::Shape(format!(
            "einsum subscripts `{subscripts}` names {} operands, got {}",
            inputs.len(),
            operands.len()
        )));
    }
    for (labels, tensor) in inputs.iter().zip(operands) {
        if labels.len() != tensor.rank() {
            return Err(Error::Shape(format!(
                "einsum subscripts `{subscripts}`: subscript of length {} for rank-{} operand",
                labels.len(),
                tensor.rank()
            )));
        }
    }

    let mut terms: Vec<Term> = inputs
        .into_iter()
        .zip(operands)
        .map(|(labels, tensor)| Term {
            labels,
            tensor: (*tensor).clone(),
        })
        .collect();

    while terms.len() > 1 {
        let (a, b) = pick_pair(&terms);
        let second = terms.remove(b);
        let first = terms.remove(a);
        let keep: Vec<char> = union(&first.labels, &second.labels)
            .into_iter()
            .filter(|c| output.contains(c) || terms.iter().any(|t| t.labels.contains(c)))
            .collect();
        let tensor = contract(&[&first, &second], &keep)?;
        terms.push(Term {
            labels: keep,
            tensor,
        });
    }

    match terms.pop() {
        Some(last) => contract(&[&last], &output),
        None => Err(Error::Shape("einsum needs at least one operand".to_string())),
    }
}

fn parse_subscripts(subscripts: &str) -> Result<(Vec<Vec<char>>, Vec<char>)> {
    let compact: String = subscripts.chars().filter(|c| !c.is_whitespace()).collect();
    let (lhs, explicit) = match compact.split_once("->") {
        Some((lhs, rhs)) => (lhs.to_string(), Some(rhs.to_string())),
        None => (compact.clone(), None),
    };
    let inputs: Vec<Vec<char>> = lhs.split(',').map(|s| s.chars().collect()).collect();
    if inputs
        .iter()
        .flatten()
        .any(|c| !c.is_ascii_alphabetic())
    {
        return Err(Error::Shape(format!("invalid einsum subscripts `{subscripts}`")));
    }

    let output: Vec<char> = match explicit {
        Some(rhs) => {
            let out: Vec<char> = rhs.chars().collect();
            for (k, c) in out.iter().enumerate() {
                if out[..k].contains(c) || !inputs.iter().any(|l| l.contains(c)) {
                    return Err(Error::Shape(format!(
                        "invalid output subscript `{c}` in einsum subscripts `{subscripts}`"
                    )));
                }
            }
            out
        }
        None => {
            let mut once: Vec<char> = inputs
                .iter()
                .flatten()
                .copied()
                .filter(|c| inputs.iter().flatten().filter(|d| *d == c).count() == 1)
                .collect();
            once.sort_unstable();
            once
        }
    };
    Ok((inputs, output))
}

fn union(a: &[char], b: &[char]) -> Vec<char> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    for &c in a.iter().chain(b) {
        if !out.contains(&c) {
            out.push(c);
        }
    }
    out
}

/// Pair of term positions (a < b) to contract next.
fn pick_pair(terms: &[Term]) -> (usize, usize) {
    let mut best = (0, 1);
    let mut best_key = (0usize, usize::MAX);
    for a in 0..terms.len() {
        for b in (a + 1)..terms.len() {
            let shared = terms[a]
                .labels
                .iter()
                .filter(|c| terms[b].labels.contains(c))
                .count();
            let width = union(&terms[a].labels, &terms[b].labels).len();
            let key = (shared, width);
            if key.0 > best_key.0 || (key.0 == best_key.0 && key.1 < best_key.1) {
                best_key = key;
                best = (a, b);
            }
        }
    }
    best
}

/// Sums the product of `terms` over every label not in `out`.
fn contract(terms: &[&Term], out: &[char]) -> Result<Tensor> {
    let labels = terms
        .iter()
        .fold(Vec::new(), |acc, t| union(&acc, &t.labels));
    let positions: Vec<Vec<usize>> = terms
        .iter()
        .map(|t| {
            t.labels
                .iter()
                .map(|c| labels.iter().position(|l| l == c).unwrap_or(0))
                .collect()
        })
        .collect();
    let out_positions: Vec<usize> = out
        .iter()
        .map(|c| labels.iter().position(|l| l == c).unwrap_or(0))
        .collect();

    let mut result_data = vec![0.0; DIM.pow(out.len() as u32)];
    let mut assignment = vec![0usize; labels.len()];
    let mut scratch = Vec::with_capacity(labels.len());
    let total = DIM.pow(labels.len() as u32);

    for _ in 0..total {
        let mut product = 1.0;
        for (term, pos) in terms.iter().zip(&positions) {
            scratch.clear();
            scratch.extend(pos.iter().map(|&p| assignment[p]));
            product *= term.tensor.data()[flatten(&scratch, DIM)];
            if product == 0.0 {
                break;
            }
        }
        if product != 0.0 {
            scratch.clear();
            scratch.extend(out_positions.iter().map(|&p| assignment[p]));
            result_data[flatten(&scratch, DIM)] += product;
        }
        // odometer increment, last label fastest
        for slot in assignment.iter_mut().rev() {
            *slot += 1;
            if *slot < DIM {
                break;
            }
            *slot = 0;
        }
    }

    Tensor::from_data(out.len(), result_data)
}
