use crate::branch::Branch;
use crate::dense::Mat;
use crate::node::Node;
use num_complex::Complex64;

/// Builds the node admittance matrix such that `I = Y * U`.
///
/// `nodes` must be in calculation order and the branch endpoints resolved
/// against it. Each branch contributes its two-port admittances; each node
/// adds its own shunt admittance to the diagonal.
pub fn make_ybus(nodes: &[Node], branches: &[Branch]) -> Mat<Complex64> {
    let nb = nodes.len();
    let mut y_bus = Mat::zeros(nb, nb);

    for br in branches {
        let (f, t) = (br.from_index, br.to_index);
        let tp = br.two_port(
            nodes[f].nominal_voltage.norm(),
            nodes[t].nominal_voltage.norm(),
        );

        y_bus.add(f, f, tp.ff);
        y_bus.add(f, t, tp.ft);
        y_bus.add(t, f, tp.tf);
        y_bus.add(t, t, tp.tt);
    }

    for (i, n) in nodes.iter().enumerate() {
        y_bus.add(i, i, n.shunt_admittance);
    }

    y_bus
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::branch::breaker_admittance;
    use crate::cmplx;
    use crate::order::{order_branches, order_nodes};
    use anyhow::Result;

    fn build(nodes: Vec<Node>, branches: Vec<Branch>) -> Result<Mat<Complex64>> {
        let (nodes, order, _) = order_nodes(nodes)?;
        let branches = order_branches(branches, &order)?;
        Ok(make_ybus(&nodes, &branches))
    }

    #[test]
    fn two_node_line() -> Result<()> {
        let y = cmplx!(4.0, -12.0);
        let ysh = cmplx!(0.0, 0.5);
        let y_bus = build(
            vec![
                Node::pq(1, cmplx!(1.0), cmplx!()),
                Node::pq(2, cmplx!(1.0), cmplx!()),
            ],
            vec![Branch::line(1, 2, y).with_shunt(ysh)],
        )?;

        assert_eq!(y_bus.get(0, 0), y + ysh / 2.0);
        assert_eq!(y_bus.get(1, 1), y + ysh / 2.0);
        assert_eq!(y_bus.get(0, 1), -y);
        assert_eq!(y_bus.get(1, 0), -y);
        Ok(())
    }

    #[test]
    fn rows_of_lossless_network_sum_to_zero() -> Result<()> {
        let y_bus = build(
            vec![
                Node::slack(1, cmplx!(1.0)),
                Node::pq(2, cmplx!(1.0), cmplx!()),
                Node::pq(3, cmplx!(1.0), cmplx!()),
            ],
            vec![
                Branch::line(1, 2, cmplx!(1.0, -5.0)),
                Branch::line(2, 3, cmplx!(2.0, -3.0)),
                Branch::line(3, 1, cmplx!(0.5, -1.0)),
            ],
        )?;
        for i in 0..3 {
            let s: Complex64 = y_bus.row(i).iter().sum();
            assert!(s.norm() < 1e-12);
        }
        Ok(())
    }

    #[test]
    fn node_shunt_lands_on_diagonal() -> Result<()> {
        let y_bus = build(
            vec![Node::pq(7, cmplx!(1.0), cmplx!()).with_shunt(cmplx!(0.1, 0.2))],
            vec![],
        )?;
        assert_eq!(y_bus.get(0, 0), cmplx!(0.1, 0.2));
        Ok(())
    }

    #[test]
    fn breaker_gets_template() -> Result<()> {
        let y_bus = build(
            vec![
                Node::pq(1, cmplx!(1.0), cmplx!()),
                Node::pq(2, cmplx!(1.0), cmplx!()),
            ],
            vec![Branch::breaker(1, 2)],
        )?;
        assert_eq!(y_bus.get(0, 1), -breaker_admittance());
        assert_eq!(y_bus.get(0, 0), breaker_admittance());
        Ok(())
    }

    #[test]
    fn transformer_is_not_symmetric_in_diagonal() -> Result<()> {
        let y = cmplx!(1.0, -10.0);
        let y_bus = build(
            vec![
                Node::pq(1, cmplx!(110.0), cmplx!()),
                Node::pq(2, cmplx!(10.0), cmplx!()),
            ],
            vec![Branch::transformer(1, 2, y, cmplx!(10.0 / 110.0))],
        )?;
        // node 2 has the lower nominal voltage and is ordered first
        let ratio = 110.0_f64 / 10.0;
        assert!((y_bus.get(0, 0) - y * ratio * ratio).norm() < 1e-9);
        assert_eq!(y_bus.get(1, 1), y);
        assert!((y_bus.get(0, 1) - y_bus.get(1, 0)).norm() < 1e-9);
        Ok(())
    }
}
