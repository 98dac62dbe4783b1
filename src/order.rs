use crate::branch::Branch;
use crate::error::PowerFlowError;
use crate::node::{Node, NodeType};
use anyhow::Result;
use std::collections::HashMap;

/// Mapping between caller node ids and calculation indexes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Order {
    pub e2i: HashMap<usize, usize>,
    pub i2e: Vec<usize>,
}

impl Order {
    pub fn index(&self, id: usize) -> Option<usize> {
        self.e2i.get(&id).copied()
    }
}

/// Per-type node counts of an ordered node list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Counts {
    pub pq: usize,
    pub pv: usize,
    pub slack: usize,
}

/// Sorts nodes into PQ, PV and Slack blocks, each by ascending nominal
/// voltage magnitude, and assigns `calc_index`. The sort is stable so
/// equal keys keep their input order.
pub fn order_nodes(mut nodes: Vec<Node>) -> Result<(Vec<Node>, Order, Counts)> {
    nodes.sort_by(|a, b| {
        a.node_type.rank().cmp(&b.node_type.rank()).then(
            a.nominal_voltage
                .norm()
                .total_cmp(&b.nominal_voltage.norm()),
        )
    });

    let mut order = Order {
        e2i: HashMap::with_capacity(nodes.len()),
        i2e: Vec::with_capacity(nodes.len()),
    };
    let mut counts = Counts::default();

    for (i, node) in nodes.iter_mut().enumerate() {
        if order.e2i.insert(node.id, i).is_some() {
            return Err(PowerFlowError::DuplicateNode(node.id).into());
        }
        order.i2e.push(node.id);
        node.calc_index = i;

        match node.node_type {
            NodeType::PQ => counts.pq += 1,
            NodeType::PV => counts.pv += 1,
            NodeType::Slack => counts.slack += 1,
        }
    }

    Ok((nodes, order, counts))
}

/// Resolves branch endpoints to calculation indexes and counts the branches
/// sharing each endpoint pair, in either direction.
pub fn order_branches(mut branches: Vec<Branch>, order: &Order) -> Result<Vec<Branch>> {
    for (i, br) in branches.iter_mut().enumerate() {
        br.from_index = order.index(br.from_id).ok_or(PowerFlowError::UnknownNode {
            branch: i,
            node: br.from_id,
        })?;
        br.to_index = order.index(br.to_id).ok_or(PowerFlowError::UnknownNode {
            branch: i,
            node: br.to_id,
        })?;
    }

    let mut parallel: HashMap<(usize, usize), usize> = HashMap::new();
    for br in branches.iter() {
        *parallel.entry(br.endpoints()).or_default() += 1;
    }
    for br in branches.iter_mut() {
        br.parallel_count = parallel[&br.endpoints()];
    }

    Ok(branches)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmplx;
    use anyhow::format_err;

    fn nodes() -> Vec<Node> {
        vec![
            Node::slack(10, cmplx!(110.0)),
            Node::pq(11, cmplx!(10.0), cmplx!(1.0, 0.5)),
            Node::pv(12, cmplx!(110.0), 112.0, 5.0),
            Node::pq(13, cmplx!(0.4), cmplx!(0.1)),
            Node::pv(14, cmplx!(10.0), 10.5, 1.0),
            Node::pq(15, cmplx!(10.0), cmplx!(0.2)),
        ]
    }

    #[test]
    fn blocks_are_sorted_by_type_then_nominal_voltage() -> Result<()> {
        let (ordered, order, counts) = order_nodes(nodes())?;

        let ids: Vec<usize> = ordered.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![13, 11, 15, 14, 12, 10]);
        assert_eq!(order.i2e, ids);
        assert_eq!(counts, Counts { pq: 3, pv: 2, slack: 1 });

        for (i, n) in ordered.iter().enumerate() {
            if n.calc_index != i || order.e2i[&n.id] != i {
                return Err(format_err!("node {} has calc_index {}", n.id, n.calc_index));
            }
        }
        Ok(())
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut n = nodes();
        n.push(Node::pq(11, cmplx!(10.0), cmplx!()));
        let err = order_nodes(n).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::DuplicateNode(11))
        );
    }

    #[test]
    fn parallel_branches_are_counted_in_both_directions() -> Result<()> {
        let (_, order, _) = order_nodes(nodes())?;
        let branches = vec![
            Branch::line(10, 11, cmplx!(1.0)),
            Branch::line(11, 10, cmplx!(1.0)),
            Branch::breaker(10, 11),
            Branch::line(11, 15, cmplx!(1.0)),
        ];
        let branches = order_branches(branches, &order)?;
        let counts: Vec<usize> = branches.iter().map(|b| b.parallel_count).collect();
        assert_eq!(counts, vec![3, 3, 3, 1]);
        assert_eq!(branches[0].from_index, 5);
        assert_eq!(branches[0].to_index, 1);
        Ok(())
    }

    #[test]
    fn dangling_endpoint_is_fatal() -> Result<()> {
        let (_, order, _) = order_nodes(nodes())?;
        let err = order_branches(vec![Branch::line(10, 99, cmplx!(1.0))], &order).unwrap_err();
        assert_eq!(
            err.downcast_ref::<PowerFlowError>(),
            Some(&PowerFlowError::UnknownNode { branch: 0, node: 99 })
        );
        Ok(())
    }
}
