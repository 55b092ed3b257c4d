//! Prompt assembly for the generative composition service.

use midi_score::MusicalAnalysis;

/// Fixed persona for every generative call.
pub const SYSTEM_PROMPT: &str = "You are an expert composer and music producer \
with deep knowledge of music theory, arrangement, and genre conventions. You \
write new instrument parts that complement the existing material: stay in the \
piece's key, follow its harmonic rhythm, and avoid dissonant clashes with the \
notes already present. Respond with JSON only, exactly matching the schema the \
user provides, with no commentary.";

/// The response schema, restated verbatim in every user prompt so the
/// service has no room to improvise field names.
const RESPONSE_SCHEMA: &str = r#"{
  "instruments": [
    {
      "name": "<track name>",
      "notes": [
        { "midi": <0-127>, "time": <seconds>, "duration": <seconds>, "velocity": <0.0-1.0> }
      ]
    }
  ]
}"#;

/// Assemble the user instruction for one unit of work.
pub fn build_user_prompt(
    analysis: &MusicalAnalysis,
    summary: &str,
    genre: Option<&str>,
    subgenre: Option<&str>,
    instruments: &[String],
    unit_label: &str,
) -> String {
    let mut prompt = format!(
        "Write new parts for the following piece of music ({}).\n\n\
         Overall piece: {:.2}s long, {:.0} BPM, {} time, key of {}, \
         {} existing tracks, pitch range {}-{}.\n",
        unit_label,
        analysis.duration_seconds,
        analysis.tempo_bpm,
        analysis.time_signature,
        analysis.key_signature,
        analysis.track_count,
        analysis.note_range.lowest,
        analysis.note_range.highest,
    );

    if let Some(genre) = genre {
        prompt.push_str(&format!("Genre: {}", genre));
        if let Some(subgenre) = subgenre {
            prompt.push_str(&format!(" ({})", subgenre));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "\nMaterial to write against:\n{}\n\
         Write one new part for each of these instruments: {}.\n\
         Note times are seconds relative to the start of this material.\n\
         Respond with JSON matching exactly this schema:\n{}\n",
        summary,
        instruments.join(", "),
        RESPONSE_SCHEMA,
    ));

    prompt
}
