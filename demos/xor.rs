//! XOR example for nodal-neat.
//!
//! This example demonstrates evolving a neural network to solve the XOR problem,
//! a classic benchmark for neuroevolution algorithms.
//!
//! Run with: `cargo run --example xor`
//! Set `RUST_LOG=nodal_neat=info` to see per-generation log lines.

use nodal_neat::{Genome, NeatConfig, Population};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing_subscriber::EnvFilter;

/// XOR truth table.
const TEST_CASES: [([f32; 2], f32); 4] = [
    ([0.0, 0.0], 0.0),
    ([0.0, 1.0], 1.0),
    ([1.0, 0.0], 1.0),
    ([1.0, 1.0], 0.0),
];

/// Evaluates how well a network solves the XOR problem.
///
/// Maximum fitness is 4.0 (perfect solution). A network that cannot be
/// evaluated scores 0.
fn xor_fitness(genome: &Genome) -> f32 {
    let mut total_error = 0.0;
    for (inputs, expected) in &TEST_CASES {
        match genome.forward_prop(inputs) {
            Ok(output) => total_error += (output[0] - expected).powi(2),
            Err(_) => return 0.0,
        }
    }
    4.0 - total_error
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    println!("NEAT XOR Example");
    println!("================\n");

    let config = NeatConfig::xor();
    let generations = 150;
    let seed = 42;

    println!("Population: {}", config.population_size);
    println!("Generations: {}", generations);
    println!();

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut population = Population::new(config, &mut rng)?;
    let mut solution_generation = None;

    for gen in 0..generations {
        let stats = population.next_generation_par(xor_fitness, &mut rng)?;

        // Fitness >= 3.9 is close enough
        if stats.best_fitness >= 3.9 && solution_generation.is_none() {
            solution_generation = Some(gen);
        }

        if gen % 10 == 0 || gen == generations - 1 {
            println!(
                "Gen {:3}: best={:.4}, avg={:.4}, connections={:.1}, hidden={:.1}",
                gen,
                stats.best_fitness,
                stats.mean_fitness,
                stats.mean_enabled_connections,
                stats.mean_hidden_nodes
            );
        }

        if solution_generation.is_some() {
            break;
        }
    }

    println!();

    let Some(champion) = population.best() else {
        return Ok(());
    };

    println!("Evolution Complete!");
    println!("==================");
    println!("Best fitness: {:.4}", champion.fitness()?);
    println!("Nodes: {}", champion.num_nodes());
    println!("Connections: {}", champion.num_enabled_connections());
    println!("Hidden nodes: {}", champion.hidden_ids().len());
    println!(
        "Innovations minted: {}",
        population.registry().innovation_count()
    );

    if let Some(gen) = solution_generation {
        println!("Solution found at generation: {}", gen);
    }

    println!("\nChampion XOR outputs:");
    for (inputs, expected) in &TEST_CASES {
        let output = champion.forward_prop(inputs)?[0];
        let rounded = if output > 0.5 { 1.0 } else { 0.0 };
        let status = if (rounded - expected).abs() < 0.1 {
            "✓"
        } else {
            "✗"
        };
        println!(
            "  {} XOR {} = {:.4} (expected {}) {}",
            inputs[0], inputs[1], output, expected, status
        );
    }

    Ok(())
}
