//! Short alphanumeric client codes derived from the client name.
//!
//! The first client to claim a prefix gets the bare three-letter prefix;
//! later collisions get a zero-padded numeric suffix one past the highest
//! suffix already in use (`ACM`, `ACM001`, `ACM002`, ...).

const SUFFIX_WIDTH: usize = 3;

/// Derive a unique code for `name` given every code already assigned.
pub fn generate_code<'a, I>(name: &str, existing_codes: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let prefix = prefix_for(name);

    let mut prefix_taken = false;
    let mut highest_suffix: u32 = 0;
    for code in existing_codes {
        if code == prefix {
            prefix_taken = true;
        } else if let Some(rest) = code.strip_prefix(&prefix) {
            if let Ok(n) = rest.parse::<u32>() {
                highest_suffix = highest_suffix.max(n);
            }
        }
    }

    if !prefix_taken && highest_suffix == 0 {
        return prefix;
    }
    format!("{prefix}{:0width$}", highest_suffix + 1, width = SUFFIX_WIDTH)
}

fn prefix_for(name: &str) -> String {
    let mut letters: String = name
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .take(3)
        .collect();
    while letters.len() < 3 {
        letters.push('X');
    }
    letters
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_first_three_letters_uppercased() {
        assert_eq!(generate_code("Acme Corp", []), "ACM");
        assert_eq!(generate_code("acme corp", []), "ACM");
    }

    #[test]
    fn strips_non_alphabetic_characters() {
        assert_eq!(generate_code("42nd & Main Ltd.", []), "NDM");
    }

    #[test]
    fn pads_short_names_with_x() {
        assert_eq!(generate_code("Al", []), "ALX");
        assert_eq!(generate_code("7", []), "XXX");
    }

    #[test]
    fn first_collision_gets_zero_padded_suffix() {
        assert_eq!(generate_code("Acme Services", ["ACM"]), "ACM001");
    }

    #[test]
    fn suffix_increments_past_highest_in_use() {
        assert_eq!(
            generate_code("Acme Three", ["ACM", "ACM001", "ACM002"]),
            "ACM003"
        );
        // Gaps do not get reused.
        assert_eq!(generate_code("Acme Four", ["ACM", "ACM005"]), "ACM006");
    }

    #[test]
    fn unrelated_prefixes_do_not_collide() {
        assert_eq!(generate_code("Acme Corp", ["BET", "BET001"]), "ACM");
    }
}
