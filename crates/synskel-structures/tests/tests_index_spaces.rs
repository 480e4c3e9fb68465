/*!
Index Space Property Tests

Checks the bijections between local, padded and global indices for arbitrary block
layouts, and that every global voxel is owned by exactly the block that maps it back.
*/

use proptest::prelude::*;
use synskel_structures::{BlockGeometry, Dims3};

fn layout() -> impl Strategy<Value = (Dims3, Dims3)> {
    (1usize..6, 1usize..6, 1usize..6, 1usize..4, 1usize..4, 1usize..4).prop_map(
        |(bz, by, bx, nz, ny, nx)| {
            let block = Dims3::new(bz, by, bx);
            let volume = Dims3::new(bz * nz, by * ny, bx * nx);
            (volume, block)
        },
    )
}

proptest! {
    #[test]
    fn local_padded_global_agree((volume, block) in layout(), seed in any::<u64>()) {
        let counts = volume.blocks_covering(block);
        let block_index = Dims3::new(
            (seed as usize) % counts.z,
            (seed as usize / 7) % counts.y,
            (seed as usize / 49) % counts.x,
        );
        let geometry = BlockGeometry::new(volume, block, block_index).unwrap();

        for local in 0..block.voxel_count() {
            let padded = geometry.local_to_padded(local);
            prop_assert!(!geometry.is_halo(padded));
            prop_assert_eq!(geometry.padded_to_local(padded), local);

            let global = geometry.local_to_global(local);
            prop_assert!(global < volume.voxel_count());
            prop_assert_eq!(geometry.global_to_local(global), local);
            prop_assert_eq!(geometry.block_of_global(global), block_index);

            let padded_global = geometry.global_to_padded_global(global);
            prop_assert_eq!(geometry.padded_global_to_global(padded_global), global);
        }
    }

    #[test]
    fn halo_count_matches_shell((volume, block) in layout()) {
        let geometry = BlockGeometry::new(volume, block, Dims3::default()).unwrap();
        let padded = geometry.padded_block_size();
        let halo = (0..padded.voxel_count()).filter(|&index| geometry.is_halo(index)).count();
        prop_assert_eq!(halo, padded.voxel_count() - block.voxel_count());
    }
}
