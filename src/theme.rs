use eframe::egui::{self, Color32, CornerRadius, FontId, Frame, Margin, Stroke, TextStyle};

/// Monokai Pro inspired palette shared by the editor, preview and chat panels.
#[derive(Debug, Clone)]
pub struct Theme {
    pub background: Color32,
    pub surface_1: Color32,
    pub surface_2: Color32,
    pub surface_3: Color32,
    pub accent_primary: Color32,
    pub accent_muted: Color32,
    pub success: Color32,
    pub warning: Color32,
    pub danger: Color32,
    pub text_primary: Color32,
    pub text_muted: Color32,
    pub spacing_8: f32,
    pub spacing_12: f32,
    pub radius_8: u8,
    pub radius_10: u8,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            background: Color32::from_rgb(0x19, 0x18, 0x1A),
            surface_1: Color32::from_rgb(0x2D, 0x2A, 0x2E),
            surface_2: Color32::from_rgb(0x36, 0x33, 0x37),
            surface_3: Color32::from_rgb(0x40, 0x3E, 0x41),
            accent_primary: Color32::from_rgb(0x78, 0xDC, 0xE8),
            accent_muted: Color32::from_rgb(0xAB, 0x9D, 0xF2),
            success: Color32::from_rgb(0xA9, 0xDC, 0x76),
            warning: Color32::from_rgb(0xFF, 0xD8, 0x66),
            danger: Color32::from_rgb(0xFF, 0x61, 0x88),
            text_primary: Color32::from_rgb(0xFC, 0xFC, 0xFA),
            text_muted: Color32::from_rgb(0x93, 0x92, 0x93),
            spacing_8: 8.0,
            spacing_12: 12.0,
            radius_8: 8,
            radius_10: 10,
        }
    }
}

impl Theme {
    pub fn apply_visuals(&self, ctx: &egui::Context) {
        let mut visuals = egui::Visuals::dark();
        visuals.panel_fill = self.surface_1;
        visuals.extreme_bg_color = self.background;
        visuals.code_bg_color = self.background;
        visuals.override_text_color = Some(self.text_primary);
        visuals.widgets.noninteractive.fg_stroke.color = self.text_primary;
        visuals.widgets.noninteractive.bg_fill = self.surface_2;
        visuals.widgets.noninteractive.bg_stroke = Stroke::NONE;
        visuals.widgets.inactive.bg_fill = self.surface_2;
        visuals.widgets.inactive.weak_bg_fill = self.surface_2;
        visuals.widgets.inactive.bg_stroke = Stroke::NONE;
        visuals.widgets.hovered.bg_fill = self.surface_3;
        visuals.widgets.hovered.weak_bg_fill = self.surface_3;
        visuals.widgets.active.bg_fill = self.accent_muted;
        visuals.selection.bg_fill = self.accent_muted;
        visuals.hyperlink_color = self.accent_primary;
        visuals.window_fill = self.surface_1;
        visuals.window_corner_radius = CornerRadius::same(self.radius_10);

        let mut style = (*ctx.style()).clone();
        style.visuals = visuals;
        style.spacing.item_spacing = egui::vec2(8.0, 6.0);
        style.spacing.button_padding = egui::vec2(10.0, 4.0);
        style.text_styles.insert(TextStyle::Heading, FontId::proportional(16.0));
        style.text_styles.insert(TextStyle::Body, FontId::proportional(14.0));
        style.text_styles.insert(TextStyle::Monospace, FontId::monospace(13.0));
        style.text_styles.insert(TextStyle::Small, FontId::proportional(12.0));
        ctx.set_style(style);
    }

    pub fn card_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_2)
            .inner_margin(Margin::same(self.spacing_12 as i8))
            .corner_radius(CornerRadius::same(self.radius_8))
            .stroke(Stroke::NONE)
    }

    pub fn composer_frame(&self) -> Frame {
        Frame::new()
            .fill(self.surface_2)
            .inner_margin(Margin::symmetric(self.spacing_12 as i8, 6))
            .corner_radius(CornerRadius::same(self.radius_10))
            .stroke(Stroke::NONE)
    }
}

#[cfg(test)]
mod tests {
    use super::Theme;

    #[test]
    fn status_colors_are_distinct() {
        let theme = Theme::default();
        assert_ne!(theme.success, theme.warning);
        assert_ne!(theme.warning, theme.danger);
        assert_ne!(theme.text_primary, theme.text_muted);
    }
}
