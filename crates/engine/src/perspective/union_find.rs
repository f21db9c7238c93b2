use std::collections::HashMap;

use crate::geometry::LineIndex;

/// Representative of one connected component; stable until the grid is mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u32);

/// Sparse union-find over lattice cells `(x, y+z)`. Only occupied cells take memory,
/// so widely separated geometry costs no more than compact geometry.
#[derive(Debug, Clone, Default)]
pub struct UnionFind2dGrid {
    slots: HashMap<LineIndex, u32>,
    parent: Vec<u32>,
    rank: Vec<u8>,
}

impl UnionFind2dGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupies `cells`, joining each to any occupied 4-neighbour already in the grid.
    pub fn extend_connected(&mut self, cells: &[LineIndex]) {
        for cell in cells {
            self.occupy(*cell);
        }
        for cell in cells {
            for neighbour in [
                LineIndex::new(cell.x.wrapping_add(1), cell.yz),
                LineIndex::new(cell.x.wrapping_sub(1), cell.yz),
                LineIndex::new(cell.x, cell.yz.wrapping_add(1)),
                LineIndex::new(cell.x, cell.yz.wrapping_sub(1)),
            ] {
                if self.is_occupied(neighbour) {
                    self.union(*cell, neighbour);
                }
            }
        }
    }

    pub fn occupied_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_occupied(&self, cell: LineIndex) -> bool {
        self.slots.contains_key(&cell)
    }

    pub fn occupy(&mut self, cell: LineIndex) {
        self.slot_or_insert(cell);
    }

    /// Joins the components of two cells, occupying both. Returns whether they were
    /// previously separate.
    pub fn union(&mut self, a: LineIndex, b: LineIndex) -> bool {
        let slot_a = self.slot_or_insert(a);
        let slot_b = self.slot_or_insert(b);
        let root_a = self.find_root_mut(slot_a);
        let root_b = self.find_root_mut(slot_b);
        if root_a == root_b {
            return false;
        }
        let (rank_a, rank_b) = (self.rank[root_a], self.rank[root_b]);
        if rank_a < rank_b {
            self.parent[root_a] = root_b as u32;
        } else if rank_a > rank_b {
            self.parent[root_b] = root_a as u32;
        } else {
            self.parent[root_b] = root_a as u32;
            self.rank[root_a] = rank_a.saturating_add(1);
        }
        true
    }

    /// Points every cell directly at its root so later `find` calls are one hop.
    pub fn compress(&mut self) {
        for slot in 0..self.parent.len() {
            let root = self.find_root_mut(slot);
            self.parent[slot] = root as u32;
        }
    }

    /// Component of an occupied cell; `None` on empty cells.
    pub fn find(&self, cell: LineIndex) -> Option<ComponentId> {
        let mut current = *self.slots.get(&cell)? as usize;
        while self.parent[current] as usize != current {
            current = self.parent[current] as usize;
        }
        Some(ComponentId(current as u32))
    }

    pub fn connected(&self, a: LineIndex, b: LineIndex) -> bool {
        match (self.find(a), self.find(b)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }

    pub fn component_count(&self) -> usize {
        self.parent
            .iter()
            .enumerate()
            .filter(|(slot, parent)| **parent as usize == *slot)
            .count()
    }

    fn slot_or_insert(&mut self, cell: LineIndex) -> usize {
        let next = self.parent.len() as u32;
        let slot = *self.slots.entry(cell).or_insert(next);
        if slot == next {
            self.parent.push(next);
            self.rank.push(0);
        }
        slot as usize
    }

    fn find_root_mut(&mut self, slot: usize) -> usize {
        let mut current = slot;
        while self.parent[current] as usize != current {
            let grandparent = self.parent[self.parent[current] as usize];
            self.parent[current] = grandparent;
            current = grandparent as usize;
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(x: i32, yz: i32) -> LineIndex {
        LineIndex::new(x, yz)
    }

    fn grid_of(cells: &[LineIndex]) -> UnionFind2dGrid {
        let mut grid = UnionFind2dGrid::new();
        grid.extend_connected(cells);
        grid.compress();
        grid
    }

    #[test]
    fn empty_grid_has_no_components() {
        let grid = grid_of(&[]);
        assert_eq!(grid.component_count(), 0);
        assert_eq!(grid.find(cell(0, 0)), None);
    }

    #[test]
    fn union_occupies_both_cells() {
        let mut grid = UnionFind2dGrid::new();
        assert!(grid.union(cell(0, 0), cell(2, 0)));
        assert!(grid.is_occupied(cell(2, 0)));
        assert!(!grid.is_occupied(cell(1, 0)));
        assert!(grid.connected(cell(0, 0), cell(2, 0)));
    }

    #[test]
    fn four_connected_regions_are_grouped() {
        let cells = [
            cell(0, 0),
            cell(1, 0),
            cell(1, 1),
            // Diagonal neighbour only: separate component.
            cell(2, 2),
            cell(5, -3),
            cell(5, -2),
        ];
        let grid = grid_of(&cells);
        assert_eq!(grid.occupied_count(), 6);
        assert_eq!(grid.component_count(), 3);
        assert!(grid.connected(cell(0, 0), cell(1, 1)));
        assert!(!grid.connected(cell(1, 1), cell(2, 2)));
        assert!(grid.connected(cell(5, -3), cell(5, -2)));
        assert_eq!(grid.find(cell(3, 0)), None);
        assert_eq!(grid.find(cell(40, 0)), None);
    }

    #[test]
    fn union_reports_whether_components_merged() {
        let mut grid = UnionFind2dGrid::new();
        assert!(grid.union(cell(0, 0), cell(1, 0)));
        assert!(grid.union(cell(1, 0), cell(2, 0)));
        assert!(!grid.union(cell(2, 0), cell(0, 0)));
        grid.compress();
        assert_eq!(grid.component_count(), 1);
        let root = grid.find(cell(0, 0)).expect("root");
        assert_eq!(grid.find(cell(2, 0)), Some(root));
    }

    #[test]
    fn extend_connects_new_cells_to_existing_ones() {
        let mut grid = grid_of(&[cell(0, 0), cell(0, 1)]);
        grid.extend_connected(&[cell(1, 1), cell(7, 7)]);
        grid.compress();
        assert_eq!(grid.component_count(), 2);
        assert!(grid.connected(cell(0, 0), cell(1, 1)));
        assert!(!grid.connected(cell(0, 0), cell(7, 7)));
    }

    #[test]
    fn far_apart_cells_only_store_what_is_occupied() {
        let cells = [
            cell(i32::MIN, i32::MIN),
            cell(i32::MAX, i32::MAX),
            cell(0, 0),
            cell(0, 1),
        ];
        let grid = grid_of(&cells);
        assert_eq!(grid.occupied_count(), 4);
        assert_eq!(grid.parent.len(), 4);
        assert_eq!(grid.component_count(), 3);
        assert!(grid.connected(cell(0, 0), cell(0, 1)));
        assert!(!grid.connected(cell(i32::MIN, i32::MIN), cell(i32::MAX, i32::MAX)));
    }

    #[test]
    fn long_chain_stays_connected_after_compress() {
        let cells: Vec<LineIndex> = (0..200).map(|x| cell(x, 7)).collect();
        let grid = grid_of(&cells);
        assert_eq!(grid.component_count(), 1);
        assert!(grid.connected(cell(0, 7), cell(199, 7)));
    }
}
