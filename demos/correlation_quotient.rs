use correlation_manifolds::prelude::*;
use ndarray::Array2;

fn main() {
    println!("=== Correlation Quotient Example ===\n");

    // Quotient of SPD(3) by positive diagonal scaling
    let metric = FullRankCorrelationAffineQuotientMetric::correlation(3).unwrap();
    let bundle = metric.bundle();

    // Two covariance matrices with different variances
    let sigma = Array2::from_shape_vec(
        (3, 3),
        vec![4.0, 1.2, 0.4, 1.2, 1.0, -0.3, 0.4, -0.3, 9.0],
    )
    .unwrap();
    let tau = Array2::from_shape_vec(
        (3, 3),
        vec![2.0, -0.6, 1.0, -0.6, 3.0, 0.9, 1.0, 0.9, 1.5],
    )
    .unwrap();

    // Riemannian submersion: normalize to unit diagonal
    let p = bundle.riemannian_submersion(&sigma).unwrap();
    let q = bundle.riemannian_submersion(&tau).unwrap();
    println!("Correlation of Σ:");
    println!("{:?}\n", p);
    println!("Correlation of T:");
    println!("{:?}\n", q);

    // Align T's fiber to P
    let aligned = bundle.align(&q, &p, 1e-10, 200).unwrap();
    let log = bundle.total_space().log(&p, &aligned).unwrap();
    println!("Aligned representative of Q:");
    println!("{:?}\n", aligned);
    println!(
        "log_P(aligned) is horizontal: {}",
        bundle.is_horizontal(&log, &p, 1e-6).unwrap()
    );

    // Quotient log/exp
    let x = metric.log(&p, &q).unwrap();
    println!("\nQuotient log map log_P(Q):");
    println!("{:?}\n", x);

    let q_recovered = metric.exp(&p, &x).unwrap();
    let error = (&q - &q_recovered).mapv(|v| v.abs()).sum();
    println!("Recovery error: {:.2e}", error);

    let quotient = metric.distance(&p, &q).unwrap();
    let total = bundle.total_space().distance(&p, &q).unwrap();
    println!("Quotient distance d(P, Q)  = {:.6}", quotient);
    println!("SPD distance between lifts = {:.6}", total);

    if error < 1e-6 && quotient <= total {
        println!("✓ Quotient exp and log are inverses, and alignment shortens the lift");
    }
}
