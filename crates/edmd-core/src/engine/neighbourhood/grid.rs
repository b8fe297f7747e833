use crate::core::models::boundary::minimum_image;
use crate::core::models::ids::ParticleId;
use crate::engine::config::ConfigError;
use nalgebra::Vector3;
use tracing::debug;

/// Upper bound on cells per dimension when the lattice is limited.
pub const MAX_CELLS_PER_DIM: usize = 100;

#[derive(Debug, Clone)]
struct Cell {
    coords: [usize; 3],
    origin: Vector3<f64>,
    head: Option<ParticleId>,
    neighbours: Vec<usize>,
    locals: Vec<usize>,
    local_neighbourhood: Vec<usize>,
}

/// Membership node of one particle, addressed by particle ID.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CellLink {
    prev: Option<ParticleId>,
    next: Option<ParticleId>,
    cell: Option<usize>,
}

/// A regular lattice of cells over the primary box, each tracking its member particles in a
/// doubly-linked list threaded through a per-particle arena.
///
/// Cell coordinates are encoded row-major with `x` fastest. Positions are folded into the
/// primary box before being mapped to a cell, so the lattice is always periodic even when the
/// boundary condition is not.
#[derive(Debug, Clone)]
pub struct CellGrid {
    cell_count: [usize; 3],
    lattice_width: Vector3<f64>,
    box_size: Vector3<f64>,
    min_cell_size: f64,
    cells: Vec<Cell>,
    links: Vec<CellLink>,
}

impl CellGrid {
    /// Builds a lattice whose cells are at least `min_cell_size` wide in every dimension and
    /// divide the box exactly.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::CellTooLarge`] when a periodic box is less than two cells wide in
    /// some dimension, and [`ConfigError::InvalidValue`] for a non-positive cell size.
    pub fn new(
        box_size: Vector3<f64>,
        min_cell_size: f64,
        limit_cells: bool,
        periodic: bool,
        particle_count: usize,
    ) -> Result<Self, ConfigError> {
        if !(min_cell_size > 0.0 && min_cell_size.is_finite()) {
            return Err(ConfigError::InvalidValue {
                field: "min_cell_size".to_string(),
                message: format!("must be positive and finite, got {min_cell_size}"),
            });
        }

        let mut cell_count = [1usize; 3];
        for dim in 0..3 {
            if periodic && min_cell_size > 0.5 * box_size[dim] {
                return Err(ConfigError::CellTooLarge {
                    dimension: dim,
                    cell_size: min_cell_size,
                    size: box_size[dim],
                });
            }
            let mut count = ((box_size[dim] / min_cell_size).floor() as usize).max(1);
            if limit_cells {
                count = count.min(MAX_CELLS_PER_DIM);
            }
            cell_count[dim] = count;
        }
        let lattice_width = Vector3::from_fn(|i, _| box_size[i] / cell_count[i] as f64);

        let total = cell_count.iter().product();
        let mut grid = Self {
            cell_count,
            lattice_width,
            box_size,
            min_cell_size,
            cells: Vec::with_capacity(total),
            links: vec![CellLink::default(); particle_count],
        };

        for id in 0..total {
            let coords = grid.coords_from_id(id);
            let origin = Vector3::from_fn(|i, _| {
                coords[i] as f64 * lattice_width[i] - 0.5 * box_size[i]
            });
            let neighbours = grid.stencil(id, coords);
            grid.cells.push(Cell {
                coords,
                origin,
                head: None,
                neighbours,
                locals: Vec::new(),
                local_neighbourhood: Vec::new(),
            });
        }

        debug!(
            cells = total,
            nx = cell_count[0],
            ny = cell_count[1],
            nz = cell_count[2],
            width = ?lattice_width.as_slice(),
            "Built cell lattice."
        );
        Ok(grid)
    }

    fn stencil(&self, id: usize, coords: [usize; 3]) -> Vec<usize> {
        let mut neighbours = Vec::with_capacity(26);
        for dz in -1i64..=1 {
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 && dz == 0 {
                        continue;
                    }
                    let neighbour = self.cell_id_from_coords([
                        coords[0] as i64 + dx,
                        coords[1] as i64 + dy,
                        coords[2] as i64 + dz,
                    ]);
                    if neighbour != id {
                        neighbours.push(neighbour);
                    }
                }
            }
        }
        neighbours.sort_unstable();
        neighbours.dedup();
        neighbours
    }

    pub fn cell_count(&self) -> [usize; 3] {
        self.cell_count
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn lattice_width(&self) -> &Vector3<f64> {
        &self.lattice_width
    }

    pub fn min_cell_size(&self) -> f64 {
        self.min_cell_size
    }

    /// Longest interaction distance the lattice can serve without missing partners.
    pub fn supported_range(&self) -> f64 {
        self.lattice_width.min()
    }

    /// Linear index of lattice coordinates, wrapping out-of-range coordinates periodically.
    pub fn cell_id_from_coords(&self, coords: [i64; 3]) -> usize {
        let wrapped: [usize; 3] =
            std::array::from_fn(|i| coords[i].rem_euclid(self.cell_count[i] as i64) as usize);
        wrapped[0] + self.cell_count[0] * (wrapped[1] + self.cell_count[1] * wrapped[2])
    }

    /// Inverse of [`Self::cell_id_from_coords`] for in-range coordinates.
    pub fn coords_from_id(&self, id: usize) -> [usize; 3] {
        let x = id % self.cell_count[0];
        let rest = id / self.cell_count[0];
        let y = rest % self.cell_count[1];
        let z = rest / self.cell_count[1];
        [x, y, z]
    }

    /// The cell containing `position` once folded into the primary box.
    pub fn cell_id(&self, position: &Vector3<f64>) -> usize {
        let folded = minimum_image(position, &self.box_size);
        let coords: [i64; 3] = std::array::from_fn(|i| {
            ((folded[i] + 0.5 * self.box_size[i]) / self.lattice_width[i]).floor() as i64
        });
        self.cell_id_from_coords(coords)
    }

    pub fn cell_coords(&self, cell: usize) -> [usize; 3] {
        self.cells[cell].coords
    }

    pub fn cell_origin(&self, cell: usize) -> &Vector3<f64> {
        &self.cells[cell].origin
    }

    /// Position relative to the lower corner of `cell`, choosing the periodic image closest
    /// to the cell centre.
    pub fn relative_position(&self, cell: usize, position: &Vector3<f64>) -> Vector3<f64> {
        let half = self.lattice_width * 0.5;
        let centre = self.cells[cell].origin + half;
        minimum_image(&(position - centre), &self.box_size) + half
    }

    pub fn neighbour_cells(&self, cell: usize) -> &[usize] {
        &self.cells[cell].neighbours
    }

    #[inline]
    pub fn cell_of(&self, particle: ParticleId) -> Option<usize> {
        self.links[particle.index()].cell
    }

    /// Pushes `particle` onto the front of `cell`'s list.
    pub fn add_to_cell(&mut self, particle: ParticleId, cell: usize) {
        debug_assert!(
            self.links[particle.index()].cell.is_none(),
            "particle {particle} is already in a cell"
        );
        let old_head = self.cells[cell].head.replace(particle);
        if let Some(head) = old_head {
            self.links[head.index()].prev = Some(particle);
        }
        self.links[particle.index()] = CellLink {
            prev: None,
            next: old_head,
            cell: Some(cell),
        };
    }

    /// Unlinks `particle` from its cell, returning the cell it was in.
    pub fn remove_from_cell(&mut self, particle: ParticleId) -> Option<usize> {
        let link = std::mem::take(&mut self.links[particle.index()]);
        let cell = link.cell?;
        match link.prev {
            Some(prev) => self.links[prev.index()].next = link.next,
            None => self.cells[cell].head = link.next,
        }
        if let Some(next) = link.next {
            self.links[next.index()].prev = link.prev;
        }
        Some(cell)
    }

    /// Moves `particle` one cell along `dim` in the direction of `step` (+1 or -1).
    pub fn shift_particle(&mut self, particle: ParticleId, dim: usize, step: i64) -> Option<usize> {
        let from = self.remove_from_cell(particle)?;
        let mut coords = self.cells[from].coords.map(|c| c as i64);
        coords[dim] += step;
        let to = self.cell_id_from_coords(coords);
        self.add_to_cell(particle, to);
        Some(to)
    }

    /// Clears every list and re-inserts all particles by position.
    pub fn place_all<'a>(&mut self, positions: impl IntoIterator<Item = &'a Vector3<f64>>) {
        for cell in &mut self.cells {
            cell.head = None;
        }
        self.links.iter_mut().for_each(|link| *link = CellLink::default());
        for (index, position) in positions.into_iter().enumerate() {
            if index >= self.links.len() {
                self.links.push(CellLink::default());
            }
            let cell = self.cell_id(position);
            self.add_to_cell(ParticleId(index), cell);
        }
    }

    pub fn members(&self, cell: usize) -> CellMembers<'_> {
        CellMembers {
            grid: self,
            next: self.cells[cell].head,
        }
    }

    /// Every particle in the same or a neighbouring cell as `particle`, excluding itself.
    pub fn particle_neighbours(
        &self,
        particle: ParticleId,
    ) -> impl Iterator<Item = ParticleId> + '_ {
        self.cell_of(particle)
            .into_iter()
            .flat_map(move |cell| {
                std::iter::once(cell).chain(self.cells[cell].neighbours.iter().copied())
            })
            .flat_map(move |cell| self.members(cell))
            .filter(move |&other| other != particle)
    }

    /// Records which locals touch which cells. `touches(local, origin, width)` decides whether
    /// a local's geometry intersects a cell.
    pub fn attach_locals(
        &mut self,
        local_count: usize,
        touches: impl Fn(usize, &Vector3<f64>, &Vector3<f64>) -> bool,
    ) {
        let width = self.lattice_width;
        for cell in &mut self.cells {
            cell.locals = (0..local_count)
                .filter(|&local| touches(local, &cell.origin, &width))
                .collect();
        }
        for id in 0..self.cells.len() {
            let mut gathered = self.cells[id].locals.clone();
            for &neighbour in &self.cells[id].neighbours {
                gathered.extend_from_slice(&self.cells[neighbour].locals);
            }
            gathered.sort_unstable();
            gathered.dedup();
            self.cells[id].local_neighbourhood = gathered;
        }
    }

    /// Locals attached to the particle's cell or its neighbours, without duplicates.
    pub fn local_neighbourhood(&self, particle: ParticleId) -> &[usize] {
        match self.cell_of(particle) {
            Some(cell) => &self.cells[cell].local_neighbourhood,
            None => &[],
        }
    }
}

pub struct CellMembers<'a> {
    grid: &'a CellGrid,
    next: Option<ParticleId>,
}

impl Iterator for CellMembers<'_> {
    type Item = ParticleId;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.grid.links[current.index()].next;
        Some(current)
    }
}
