//! Scripted world changes: `TICK:ACTION[:X,Y]`.

use std::str::FromStr;

use anyhow::{Context, Result, anyhow, bail};
use stopgrid_core::Point;
use stopgrid_sim::Simulation;

/// A grid cell given as `X,Y` on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cell(pub Point);

impl FromStr for Cell {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let (x, y) = s
            .split_once(',')
            .ok_or_else(|| anyhow!("expected X,Y, got {s:?}"))?;
        let x = x.trim().parse().with_context(|| format!("bad x in {s:?}"))?;
        let y = y.trim().parse().with_context(|| format!("bad y in {s:?}"))?;
        Ok(Cell(Point::new(x, y)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Block(Point),
    Unblock(Point),
    ToggleStop(Point),
    Diagonal(bool),
    Seek(bool),
}

/// One scheduled change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub tick: u64,
    pub action: Action,
}

impl FromStr for Step {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(3, ':');
        let tick = parts
            .next()
            .unwrap_or_default()
            .parse()
            .with_context(|| format!("bad tick in {s:?}"))?;
        let verb = parts.next().ok_or_else(|| anyhow!("missing action in {s:?}"))?;
        let arg = parts.next();

        let cell = || -> Result<Point> {
            let arg = arg.ok_or_else(|| anyhow!("{verb} needs X,Y in {s:?}"))?;
            Ok(arg.parse::<Cell>()?.0)
        };
        let switch = || -> Result<bool> {
            match arg {
                Some("on") => Ok(true),
                Some("off") => Ok(false),
                _ => bail!("{verb} needs on or off in {s:?}"),
            }
        };
        let action = match verb {
            "block" => Action::Block(cell()?),
            "unblock" => Action::Unblock(cell()?),
            "stop" => Action::ToggleStop(cell()?),
            "diagonal" => Action::Diagonal(switch()?),
            "seek" => Action::Seek(switch()?),
            other => bail!("unknown action {other:?}"),
        };
        Ok(Step { tick, action })
    }
}

impl Step {
    /// Apply the change to `sim`.
    pub fn apply(&self, sim: &mut Simulation) -> Result<()> {
        let tile = |p: Point| {
            sim.grid()
                .id_of(p)
                .ok_or_else(|| anyhow!("{p} is outside the board"))
        };
        match self.action {
            Action::Block(p) => {
                let t = tile(p)?;
                sim.add_blocker(t)?;
            }
            Action::Unblock(p) => {
                let t = tile(p)?;
                sim.remove_blocker(t)?;
            }
            Action::ToggleStop(p) => {
                let t = tile(p)?;
                sim.toggle_stop(t)?;
            }
            Action::Diagonal(on) => {
                sim.set_diagonal(on);
            }
            Action::Seek(on) => {
                sim.set_seek_mode(on);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_steps() {
        let step: Step = "12:block:3,4".parse().unwrap();
        assert_eq!(
            step,
            Step {
                tick: 12,
                action: Action::Block(Point::new(3, 4))
            }
        );
        let step: Step = "0:seek:on".parse().unwrap();
        assert_eq!(step.action, Action::Seek(true));
        let step: Step = "7:diagonal:off".parse().unwrap();
        assert_eq!(step.action, Action::Diagonal(false));
    }

    #[test]
    fn rejects_garbage() {
        assert!("x:block:1,1".parse::<Step>().is_err());
        assert!("3:teleport:1,1".parse::<Step>().is_err());
        assert!("3:stop".parse::<Step>().is_err());
        assert!("3:seek:maybe".parse::<Step>().is_err());
        assert!("3:block:1;1".parse::<Step>().is_err());
    }

    #[test]
    fn off_board_cell_is_an_error() {
        let mut sim = Simulation::with_side(5, Default::default()).unwrap();
        let step: Step = "0:block:9,9".parse().unwrap();
        assert!(step.apply(&mut sim).is_err());
        let step: Step = "0:block:1,1".parse().unwrap();
        step.apply(&mut sim).unwrap();
        assert!(!sim.grid().tile(6).unwrap().passable);
    }
}
