use super::repo_types::Monster;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonsterToggle {
    Added,
    Removed,
}

/// Removes every entry sharing `monster.slug`, or appends `monster` when none
/// does.
pub fn toggle_monster(monsters: &mut Vec<Monster>, monster: Monster) -> MonsterToggle {
    let before = monsters.len();
    monsters.retain(|m| m.slug != monster.slug);
    if monsters.len() < before {
        MonsterToggle::Removed
    } else {
        monsters.push(monster);
        MonsterToggle::Added
    }
}

pub fn toggle_message(toggle: MonsterToggle, monster: &str, campaign: &str) -> String {
    match toggle {
        MonsterToggle::Added => format!("{monster} has been added to {campaign}."),
        MonsterToggle::Removed => format!("{monster} has been removed from {campaign}."),
    }
}
