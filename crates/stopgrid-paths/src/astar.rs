use stopgrid_core::Point;

use crate::PathRange;
use crate::traits::AstarPather;

impl PathRange {
    /// Compute the shortest path from `from` to `to` using A*.
    ///
    /// Returns the full path (including both endpoints) or `None` if `to`
    /// cannot be reached through passable points. The start point itself is
    /// never checked for passability.
    ///
    /// # Panics
    ///
    /// If the pather reports a negative cost or estimate.
    pub fn astar_path<P: AstarPather>(
        &mut self,
        pather: &P,
        from: Point,
        to: Point,
    ) -> Option<Vec<Point>> {
        let start_idx = self.idx(from)?;
        let goal_idx = self.idx(to)?;

        if start_idx == goal_idx {
            return Some(vec![from]);
        }

        self.reset();

        {
            let h = pather.estimate(from, to);
            assert!(h >= 0, "negative estimate {h} from {from} to {to}");
            let node = &mut self.nodes[start_idx];
            node.g = 0;
            node.h = h;
        }
        self.open.insert(&mut self.nodes, start_idx);

        let mut nbuf = std::mem::take(&mut self.nbuf);

        let found = 'search: loop {
            let Some(ci) = self.open.extract_min(&mut self.nodes) else {
                break 'search false;
            };
            self.nodes[ci].closed = true;

            if ci == goal_idx {
                break 'search true;
            }

            let current_g = self.nodes[ci].g;
            let current_point = self.point(ci);

            nbuf.clear();
            pather.neighbors(current_point, &mut nbuf);

            for &np in nbuf.iter() {
                let Some(ni) = self.idx(np) else {
                    continue;
                };
                if self.nodes[ni].closed || !pather.passable(np) {
                    continue;
                }

                let step = pather.cost(current_point, np);
                assert!(step >= 0, "negative step cost {step} from {current_point} to {np}");
                let tentative_g = current_g + step;

                let queued = self.open.contains(&self.nodes, ni);
                if queued && tentative_g >= self.nodes[ni].g {
                    continue;
                }

                let h = pather.estimate(np, to);
                assert!(h >= 0, "negative estimate {h} from {np} to {to}");
                let n = &mut self.nodes[ni];
                n.g = tentative_g;
                n.h = h;
                n.parent = ci;

                if queued {
                    self.open.update_priority(&mut self.nodes, ni);
                } else {
                    self.open.insert(&mut self.nodes, ni);
                }
            }
        };

        self.nbuf = nbuf;
        self.open.clear(&mut self.nodes);

        if !found {
            return None;
        }

        // Reconstruct path.
        let mut path = Vec::new();
        let mut ci = goal_idx;
        while ci != usize::MAX {
            path.push(self.point(ci));
            ci = self.nodes[ci].parent;
        }
        path.reverse();
        Some(path)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{HashSet, VecDeque};

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use stopgrid_core::{Point, Range};

    use crate::{AstarPather, PathRange, Pather, WeightedPather, manhattan, octile};

    struct TestMap {
        rng: Range,
        walls: HashSet<Point>,
        diagonal: bool,
    }

    impl TestMap {
        fn open(side: i32, diagonal: bool) -> Self {
            Self {
                rng: Range::square(side),
                walls: HashSet::new(),
                diagonal,
            }
        }
    }

    impl Pather for TestMap {
        fn neighbors(&self, p: Point, buf: &mut Vec<Point>) {
            let inside = |q: &Point| self.rng.contains(*q);
            if self.diagonal {
                buf.extend(p.neighbors_8().into_iter().filter(inside));
            } else {
                buf.extend(p.neighbors_4().into_iter().filter(inside));
            }
        }

        fn passable(&self, p: Point) -> bool {
            !self.walls.contains(&p)
        }
    }

    impl WeightedPather for TestMap {
        fn cost(&self, from: Point, to: Point) -> i32 {
            self.estimate(from, to)
        }
    }

    impl AstarPather for TestMap {
        fn estimate(&self, from: Point, to: Point) -> i32 {
            if self.diagonal {
                octile(from, to)
            } else {
                manhattan(from, to)
            }
        }
    }

    fn bfs_steps(map: &TestMap, from: Point, to: Point) -> Option<usize> {
        let mut seen = HashSet::from([from]);
        let mut queue = VecDeque::from([(from, 0)]);
        while let Some((p, d)) = queue.pop_front() {
            if p == to {
                return Some(d);
            }
            for n in p.neighbors_4() {
                if map.rng.contains(n) && map.passable(n) && seen.insert(n) {
                    queue.push_back((n, d + 1));
                }
            }
        }
        None
    }

    fn assert_connected(path: &[Point], diagonal: bool) {
        for w in path.windows(2) {
            let d = w[1] - w[0];
            let (dx, dy) = (d.x.abs(), d.y.abs());
            if diagonal {
                assert!(dx <= 1 && dy <= 1 && dx + dy > 0, "bad step {} -> {}", w[0], w[1]);
            } else {
                assert_eq!(dx + dy, 1, "bad step {} -> {}", w[0], w[1]);
            }
        }
    }

    #[test]
    fn straight_line() {
        let map = TestMap::open(10, false);
        let mut pr = PathRange::new(map.rng);
        let path = pr
            .astar_path(&map, Point::new(0, 0), Point::new(5, 0))
            .unwrap();
        assert_eq!(path.len(), 6);
        assert_eq!(path[0], Point::new(0, 0));
        assert_eq!(path[5], Point::new(5, 0));
    }

    #[test]
    fn same_point() {
        let map = TestMap::open(4, false);
        let mut pr = PathRange::new(map.rng);
        let path = pr.astar_path(&map, Point::new(2, 2), Point::new(2, 2));
        assert_eq!(path, Some(vec![Point::new(2, 2)]));
    }

    #[test]
    fn out_of_range_is_none() {
        let map = TestMap::open(4, false);
        let mut pr = PathRange::new(map.rng);
        assert_eq!(pr.astar_path(&map, Point::new(0, 0), Point::new(4, 0)), None);
    }

    #[test]
    fn diagonal_path_is_cheaper() {
        let mut pr = PathRange::new(Range::square(5));
        let (from, to) = (Point::new(0, 0), Point::new(4, 4));

        let flat = TestMap::open(5, false);
        let path = pr.astar_path(&flat, from, to).unwrap();
        assert_eq!(path.len(), 9);
        assert_eq!(pr.node(to).unwrap().g, 8);

        let diag = TestMap::open(5, true);
        let path = pr.astar_path(&diag, from, to).unwrap();
        assert_eq!(path.len(), 5);
        assert_connected(&path, true);
        assert_eq!(pr.node(to).unwrap().g, 56);
    }

    #[test]
    fn walled_off_target_is_none() {
        let mut map = TestMap::open(6, false);
        let target = Point::new(3, 3);
        for n in target.neighbors_4() {
            map.walls.insert(n);
        }
        let mut pr = PathRange::new(map.rng);
        assert_eq!(pr.astar_path(&map, Point::new(0, 0), target), None);

        // Corners stay open, so 8-way movement slips through.
        map.diagonal = true;
        assert!(pr.astar_path(&map, Point::new(0, 0), target).is_some());
    }

    #[test]
    fn blocked_target_is_none() {
        let mut map = TestMap::open(5, false);
        map.walls.insert(Point::new(4, 4));
        let mut pr = PathRange::new(map.rng);
        assert_eq!(pr.astar_path(&map, Point::new(0, 0), Point::new(4, 4)), None);
    }

    #[test]
    fn detours_around_wall() {
        let mut map = TestMap::open(5, false);
        for y in 0..4 {
            map.walls.insert(Point::new(2, y));
        }
        let mut pr = PathRange::new(map.rng);
        let path = pr
            .astar_path(&map, Point::new(0, 0), Point::new(4, 0))
            .unwrap();
        assert_connected(&path, false);
        assert!(path.iter().all(|p| map.passable(*p)));
        assert_eq!(path.len() - 1, 12);
    }

    #[test]
    fn matches_bfs_on_random_maps() {
        let mut rng = StdRng::seed_from_u64(0x5eed);
        for _ in 0..200 {
            let side = rng.random_range(3..9);
            let mut map = TestMap::open(side, false);
            for p in map.rng {
                if rng.random_bool(0.3) {
                    map.walls.insert(p);
                }
            }
            let from = Point::new(rng.random_range(0..side), rng.random_range(0..side));
            let to = Point::new(rng.random_range(0..side), rng.random_range(0..side));
            map.walls.remove(&from);

            let mut pr = PathRange::new(map.rng);
            let got = pr.astar_path(&map, from, to);
            let want = bfs_steps(&map, from, to);
            match (got, want) {
                (Some(path), Some(steps)) => {
                    assert_eq!(path.len() - 1, steps, "{from} -> {to}");
                    assert_eq!(path.first(), Some(&from));
                    assert_eq!(path.last(), Some(&to));
                    assert_connected(&path, false);
                }
                (None, None) => {}
                (got, want) => panic!("{from} -> {to}: astar {got:?}, bfs {want:?}"),
            }
        }
    }

    #[test]
    fn repeated_searches_do_not_leak_state() {
        let mut map = TestMap::open(6, false);
        let mut pr = PathRange::new(map.rng);
        let (from, to) = (Point::new(0, 0), Point::new(5, 5));
        let first = pr.astar_path(&map, from, to).unwrap();

        for x in 0..5 {
            map.walls.insert(Point::new(x, 3));
        }
        let detour = pr.astar_path(&map, from, to).unwrap();
        assert!(detour.iter().all(|p| map.passable(*p)));

        map.walls.clear();
        let again = pr.astar_path(&map, from, to).unwrap();
        assert_eq!(first, again);
    }
}
