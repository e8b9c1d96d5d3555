use std::time::Instant;

use crate::error::SphResult;
use crate::simulation::searcher::SearcherKind;
use crate::simulation::sph::SphSystemData;
use crate::simulation::states::NVec3;

const SEARCHERS: [SearcherKind; 3] = [SearcherKind::HashGrid, SearcherKind::Octree, SearcherKind::SimpleList];

/// Helper to build a system of `n` particles in a unit-ish blob
fn make_system(n: usize, kind: SearcherKind) -> SphResult<SphSystemData> {
    let positions: Vec<NVec3> = (0..n)
        .map(|i| {
            let i_f = i as f64;
            // deterministic positions, no rand needed
            NVec3::new(
                (i_f * 0.37).sin(),
                (i_f * 0.13).cos(),
                (i_f * 0.07).sin(),
            )
        })
        .collect();

    let mut system = SphSystemData::new();
    system.set_target_spacing(0.05);
    system.set_searcher_kind(kind);
    system.add_particles(&positions, &[])?;
    Ok(system)
}

/// Time searcher + neighbor list build for every searcher kind
pub fn bench_searchers() -> SphResult<()> {
    // Simple list is quadratic, keep n modest
    let ns = [500, 1000, 2000, 4000];

    for n in ns {
        let mut row = format!("N = {n:5}");
        for kind in SEARCHERS {
            let mut system = make_system(n, kind)?;

            // Warm up
            system.build_neighbor_searcher();

            let t0 = Instant::now();
            system.build_neighbor_searcher();
            let dt = t0.elapsed().as_secs_f64();

            row.push_str(&format!(", {} = {:8.6} s", kind.name(), dt));
        }
        println!("{row}");
    }
    Ok(())
}

/// Density update cost against particle count, hash grid searcher.
/// Paste output directly into a spreadsheet to graph
pub fn bench_densities() -> SphResult<()> {
    println!("N,build_ms,density_ms,avg_neighbors");

    for n in (1000..=16000).step_by(1000) {
        let mut system = make_system(n, SearcherKind::HashGrid)?;

        let t0 = Instant::now();
        system.build_neighbor_searcher();
        let build_ms = t0.elapsed().as_secs_f64() * 1000.0;

        let t1 = Instant::now();
        system.update_densities();
        let density_ms = t1.elapsed().as_secs_f64() * 1000.0;

        let avg = system.neighbor_list_table().total_neighbors() as f64 / n as f64;
        println!("{},{:.6},{:.6},{:.2}", n, build_ms, density_ms, avg);
    }
    Ok(())
}
