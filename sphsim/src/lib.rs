pub mod simulation;
pub mod configuration;
pub mod benchmark;
pub mod error;

pub use error::{HandleKind, SphError, SphResult};

pub use simulation::states::{ChannelData, NVec3, ParticleSystemData, ScalarHandle, VectorHandle, FORCE, POSITION, VELOCITY};
pub use simulation::params::SphParameters;
pub use simulation::kernel::{SphKernel, SpikyKernel, StdKernel};
pub use simulation::searcher::{PointHashGridSearcher, PointNeighborSearcher, PointSimpleListSearcher, SearcherKind};
pub use simulation::octree::PointOctreeSearcher;
pub use simulation::neighbors::{BuildStamp, NeighborLists};
pub use simulation::sph::{SphSystemData, DENSITY, PRESSURE};
pub use simulation::snapshot::{SphSnapshot, SNAPSHOT_VERSION};
pub use simulation::scenario::Scenario;

pub use configuration::config::{ParametersConfig, ParticleConfig, ScenarioConfig};

pub use benchmark::benchmark::{bench_densities, bench_searchers};
