//! Operator console commands read from stdin.

use tracing::{error, info};
use vx_world::{BlockPos, QueueKind, World};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    Status,
    Save,
    Stop,
    Focus(BlockPos),
    Get(BlockPos),
    Set(BlockPos, String),
}

/// What the main loop should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

pub fn parse(line: &str) -> Result<Command, String> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Err("empty command".into());
    };
    let args: Vec<&str> = parts.collect();
    match (name, args.as_slice()) {
        ("help", []) => Ok(Command::Help),
        ("status", []) => Ok(Command::Status),
        ("save", []) => Ok(Command::Save),
        ("stop", []) => Ok(Command::Stop),
        ("focus", [x, y, z]) => Ok(Command::Focus(parse_pos(x, y, z)?)),
        ("get", [x, y, z]) => Ok(Command::Get(parse_pos(x, y, z)?)),
        ("set", [x, y, z, block]) => Ok(Command::Set(parse_pos(x, y, z)?, block.to_string())),
        ("focus" | "get", _) => Err(format!("usage: {name} <x> <y> <z>")),
        ("set", _) => Err("usage: set <x> <y> <z> <block>".into()),
        _ => Err(format!("unknown command {name:?}, try \"help\"")),
    }
}

fn parse_pos(x: &str, y: &str, z: &str) -> Result<BlockPos, String> {
    let coord = |s: &str| {
        s.parse::<i32>()
            .map_err(|_| format!("invalid coordinate {s:?}"))
    };
    Ok(BlockPos::new(coord(x)?, coord(y)?, coord(z)?))
}

/// Run one command against the world. Blocking; call off the async runtime.
pub fn execute(world: &World, command: Command) -> Flow {
    match command {
        Command::Help => {
            info!("commands: help, status, save, stop, focus <x> <y> <z>, get <x> <y> <z>, set <x> <y> <z> <block>");
        }
        Command::Status => {
            let queues = world.queues();
            info!(
                "focus {} | {} resident, {} unloading | updates {} (+{} no-load), repaints {}",
                world.focus(),
                world.resident_count(),
                world.unload_queue_len(),
                queues.len(QueueKind::Update),
                queues.len(QueueKind::UpdateNoLoad),
                queues.len(QueueKind::Repaint),
            );
        }
        Command::Save => {
            world.flush_block_queue();
            match world.save_all() {
                Ok(n) => info!("saved {n} chunks"),
                Err(e) => error!("save failed: {e}"),
            }
        }
        Command::Stop => return Flow::Stop,
        Command::Focus(pos) => {
            world.set_focus(pos);
            info!("focus moved to {pos}");
        }
        Command::Get(pos) => match world.get_block(pos) {
            Ok(Some(view)) => info!("{pos}: {} rotation {}", view.name(), view.rotation),
            Ok(None) => info!("{pos}: air"),
            Err(e) => error!("get {pos} failed: {e}"),
        },
        Command::Set(pos, block) => match world.set_block(pos, &block, 0) {
            Ok(()) => info!("{pos} set to {block}"),
            Err(e) => error!("set {pos} failed: {e}"),
        },
    }
    Flow::Continue
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use vx_world::{BlockRegistry, BlockType, WorldConfig};

    #[test]
    fn parse_commands() {
        assert_eq!(parse("status"), Ok(Command::Status));
        assert_eq!(parse("  save  "), Ok(Command::Save));
        assert_eq!(parse("stop"), Ok(Command::Stop));
        assert_eq!(parse("focus 1 -2 3"), Ok(Command::Focus(BlockPos::new(1, -2, 3))));
        assert_eq!(
            parse("set 0 64 0 stone"),
            Ok(Command::Set(BlockPos::new(0, 64, 0), "stone".into()))
        );
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!(parse("").is_err());
        assert!(parse("fly").is_err());
        assert!(parse("focus 1 2").is_err());
        assert!(parse("get 1 two 3").is_err());
        assert!(parse("set 1 2 3").is_err());
        assert!(parse("status now").is_err());
    }

    #[test]
    fn execute_against_world() {
        let dir = std::env::temp_dir().join(format!("vx_console_test_{}", rand::random::<u64>()));
        let mut reg = BlockRegistry::new();
        reg.register(BlockType::new("stone")).unwrap();
        let world = World::open(WorldConfig::with_directory(dir.clone()), Arc::new(reg)).unwrap();

        let pos = BlockPos::new(3, 4, 5);
        assert_eq!(execute(&world, Command::Set(pos, "stone".into())), Flow::Continue);
        assert_eq!(world.get_block(pos).unwrap().unwrap().name(), "stone");
        assert_eq!(execute(&world, Command::Save), Flow::Continue);
        assert!(world.store().contains(pos.chunk_pos()));
        assert_eq!(execute(&world, Command::Focus(pos)), Flow::Continue);
        assert_eq!(world.focus(), pos);
        assert_eq!(execute(&world, Command::Stop), Flow::Stop);

        std::fs::remove_dir_all(&dir).ok();
    }
}
