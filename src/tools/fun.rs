//! Dice, coins, and the magic 8-ball

use rand::Rng;
use rand::seq::SliceRandom;

const EIGHT_BALL_RESPONSES: &[&str] = &[
    // Positive
    "It is certain",
    "It is decidedly so",
    "Without a doubt",
    "Yes definitely",
    "You may rely on it",
    "As I see it, yes",
    "Most likely",
    "Outlook good",
    "Yes",
    "Signs point to yes",
    // Non-committal
    "Reply hazy, try again",
    "Ask again later",
    "Better not tell you now",
    "Cannot predict now",
    "Concentrate and ask again",
    // Negative
    "Don't count on it",
    "My reply is no",
    "My sources say no",
    "Outlook not so good",
    "Very doubtful",
];

/// Roll `count` dice with `sides` sides each
#[must_use]
pub fn roll_dice(count: u32, sides: u32) -> String {
    if !(1..=10).contains(&count) {
        return "Please roll between 1 and 10 dice".to_string();
    }
    if !(2..=100).contains(&sides) {
        return "Dice must have between 2 and 100 sides".to_string();
    }

    let mut rng = rand::thread_rng();
    let rolls: Vec<u32> = (0..count).map(|_| rng.gen_range(1..=sides)).collect();

    if count == 1 {
        format!("Rolled 1d{sides}: {}", rolls[0])
    } else {
        let total: u32 = rolls.iter().sum();
        let rolls_str = rolls
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        format!("Rolled {count}d{sides}: [{rolls_str}] = {total}")
    }
}

/// Flip a coin
#[must_use]
pub fn flip_coin() -> String {
    let side = if rand::thread_rng().gen_bool(0.5) {
        "Heads"
    } else {
        "Tails"
    };
    format!("Coin flip: {side}")
}

/// Random integer in `[min_value, max_value]`
#[must_use]
pub fn random_number(min_value: i64, max_value: i64) -> String {
    if min_value >= max_value {
        return "Min value must be less than max value".to_string();
    }
    if max_value.saturating_sub(min_value) > 1_000_000 {
        return "Range too large (max 1 million)".to_string();
    }

    let value = rand::thread_rng().gen_range(min_value..=max_value);
    format!("Random number ({min_value}-{max_value}): {value}")
}

/// Consult the magic 8-ball
#[must_use]
pub fn magic_8ball() -> String {
    let mut rng = rand::thread_rng();
    let answer = EIGHT_BALL_RESPONSES
        .choose(&mut rng)
        .copied()
        .unwrap_or("Reply hazy, try again");
    format!("8-ball says: {answer}")
}
