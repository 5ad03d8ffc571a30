mod chromosome;
mod organism;

pub use chromosome::Chromosome;
pub use organism::Organism;
