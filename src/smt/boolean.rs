//! Pure normal-form manipulation of specs: CNF to DNF, back again, and
//! spec negation. Works on the syntactic level only; semantic pruning of
//! impossible attribute combinations is left to the 1x1 item encoding in
//! the goal mutator.

use crate::domain::{Clause, Cnf, Literal, LiteralAtom};

fn normalise(mut term: Vec<Literal>) -> Option<Vec<Literal>> {
    term.sort();
    term.dedup();
    // a term holding a literal and its negation is vacuous
    for literal in &term {
        if term.contains(&literal.negated()) {
            return None;
        }
    }
    Some(term)
}

/// Drop terms that are supersets of another term (absorption).
fn absorb(mut terms: Vec<Vec<Literal>>) -> Vec<Vec<Literal>> {
    terms.sort_by_key(Vec::len);
    let mut kept: Vec<Vec<Literal>> = vec![];
    'outer: for term in terms {
        for smaller in &kept {
            if smaller.iter().all(|literal| term.contains(literal)) {
                continue 'outer;
            }
        }
        kept.push(term);
    }
    kept.sort();
    kept
}

/// Distribute one normal form into its dual: the terms of the output are
/// all ways of picking one literal from each input term.
fn distribute(terms: &[Vec<Literal>]) -> Vec<Vec<Literal>> {
    let mut acc: Vec<Vec<Literal>> = vec![vec![]];
    for term in terms {
        let mut next = vec![];
        for partial in &acc {
            for literal in term {
                let mut grown = partial.clone();
                grown.push(*literal);
                if let Some(grown) = normalise(grown) {
                    next.push(grown);
                }
            }
        }
        next.sort();
        next.dedup();
        acc = next;
    }
    absorb(acc)
}

pub fn cnf_to_dnf(cnf: &Cnf) -> Vec<Vec<Literal>> {
    distribute(cnf)
}

pub fn dnf_to_cnf(dnf: &[Vec<Literal>]) -> Cnf {
    distribute(dnf)
}

/// Negate a spec. Every clause is first widened with `noname` so that the
/// complement requires an item to be present, then De Morgan gives a DNF
/// which is converted back to CNF.
pub fn negate_cnf(cnf: &Cnf) -> Cnf {
    let widened: Cnf = cnf
        .iter()
        .map(|clause| {
            let mut clause: Clause = clause.clone();
            clause.push(Literal::positive(LiteralAtom::Noname));
            clause
        })
        .collect();

    // not(and of ors) = or of ands of negated literals
    let negated_dnf: Vec<Vec<Literal>> = widened
        .iter()
        .filter_map(|clause| {
            normalise(clause.iter().map(Literal::negated).collect())
        })
        .collect();
    dnf_to_cnf(&negated_dnf)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ItemColour, ItemName};

    fn name(n: ItemName) -> Literal {
        Literal::positive(LiteralAtom::Name(n))
    }

    fn colour(c: ItemColour) -> Literal {
        Literal::positive(LiteralAtom::Colour(c))
    }

    #[test]
    fn single_clause_cnf_explodes_into_unit_terms() {
        let cnf = vec![vec![colour(ItemColour::Red), colour(ItemColour::Blue)]];
        let dnf = cnf_to_dnf(&cnf);
        assert_eq!(
            dnf,
            vec![vec![colour(ItemColour::Red)], vec![colour(ItemColour::Blue)]]
                .into_iter()
                .map(|mut t| {
                    t.sort();
                    t
                })
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn two_clauses_produce_the_cross_product() {
        let cnf = vec![
            vec![colour(ItemColour::Red), colour(ItemColour::Green)],
            vec![name(ItemName::Lemon)],
        ];
        let dnf = cnf_to_dnf(&cnf);
        assert_eq!(dnf.len(), 2);
        for term in &dnf {
            assert!(term.contains(&name(ItemName::Lemon)));
        }
    }

    #[test]
    fn round_trip_preserves_equivalence_on_simple_specs() {
        let cnf = vec![
            vec![colour(ItemColour::Red)],
            vec![name(ItemName::Strawberry), name(ItemName::Lemon)],
        ];
        let back = dnf_to_cnf(&cnf_to_dnf(&cnf));
        assert_eq!(back, {
            let mut sorted: Cnf = cnf.iter().map(|c| {
                let mut c = c.clone();
                c.sort();
                c
            }).collect();
            sorted.sort();
            sorted
        });
    }

    #[test]
    fn contradictory_terms_are_dropped() {
        let red = colour(ItemColour::Red);
        let cnf = vec![vec![red], vec![red.negated()]];
        assert!(cnf_to_dnf(&cnf).is_empty());
    }

    #[test]
    fn negation_requires_an_item() {
        let cnf = vec![vec![name(ItemName::Strawberry)]];
        let negated = negate_cnf(&cnf);
        // not(strawberry or noname) = not strawberry and not noname
        assert_eq!(
            negated,
            vec![
                vec![name(ItemName::Strawberry).negated()],
                vec![Literal::positive(LiteralAtom::Noname).negated()],
            ]
        );
    }

    #[test]
    fn negation_of_a_conjunction_spec() {
        // (red) and (circle) -> not red or not circle, still item-bearing
        let cnf = vec![vec![colour(ItemColour::Red)], vec![name(ItemName::Circle)]];
        let negated = negate_cnf(&cnf);
        let dnf = cnf_to_dnf(&negated);
        // every satisfying assignment must violate red or circle
        assert!(dnf.iter().all(|term| {
            term.contains(&colour(ItemColour::Red).negated())
                || term.contains(&name(ItemName::Circle).negated())
        }));
    }
}
