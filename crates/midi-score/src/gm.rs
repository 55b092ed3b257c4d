//! General MIDI program-number helpers.

/// Map a GM program number (0-127) to its instrument family name.
///
/// Family granularity is enough for track labels and prompts; individual
/// patch names within a family rarely change how a part is written.
pub fn program_family(program: u8) -> &'static str {
    match program {
        0..=7 => "Piano",
        8..=15 => "Chromatic Percussion",
        16..=23 => "Organ",
        24..=31 => "Guitar",
        32..=39 => "Bass",
        40..=47 => "Strings",
        48..=55 => "Ensemble",
        56..=63 => "Brass",
        64..=71 => "Reed",
        72..=79 => "Pipe",
        80..=87 => "Synth Lead",
        88..=95 => "Synth Pad",
        96..=103 => "Synth Effects",
        104..=111 => "Ethnic",
        112..=119 => "Percussive",
        _ => "Sound Effects",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn family_boundaries() {
        assert_eq!(program_family(0), "Piano");
        assert_eq!(program_family(33), "Bass");
        assert_eq!(program_family(40), "Strings");
        assert_eq!(program_family(127), "Sound Effects");
    }
}
