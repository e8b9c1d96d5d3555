pub mod states;
pub mod params;
pub mod kernel;
pub mod searcher;
pub mod octree;
pub mod neighbors;
pub mod sph;
pub mod snapshot;
pub mod scenario;
