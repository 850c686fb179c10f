use crate::models::TasteProfile;

pub const ANALYSIS_PROMPT: &str = "Analyze this interior design image. Extract: dominant color palette (3 hex codes), key materials/textures (e.g., 'oak wood', 'linen', 'matte metal'), layout style (e.g., 'open', 'cozy', 'symmetrical'), emotional mood (e.g., 'calm', 'energetic', 'luxurious'). Return as a JSON object.";

pub fn room_prompt(profile: &TasteProfile, room_description: &str) -> String {
    format!(
        "Generate a photorealistic image of a {} that visually embodies this aesthetic profile: \
         Color Palette: {}, Materials/Textures: {}, Mood: {}. \
         Maintain consistent lighting, perspective, and spatial logic. \
         Ensure the space is functional for the described use case.",
        room_description.trim(),
        profile.colors.join(", "),
        profile.textures.join(", "),
        profile.moods.join(", "),
    )
}

pub fn edit_prompt(instruction: &str) -> String {
    format!(
        "Modify this image to: {}. Preserve style, lighting, materials, and perspective.",
        instruction.trim()
    )
}

/// Try-on instructions are passed through untouched.
pub fn try_on_prompt(instruction: &str) -> String {
    instruction.trim().to_string()
}
