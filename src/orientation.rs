//! Orientation Manager (spec §4.6): a single point of policy mapping an
//! abstract main/cross axis onto horizontal or vertical CSS.

use web_sys::Element;

/// The list's scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    /// Items stack top to bottom; the main axis is Y.
    Vertical,
    /// Items stack left to right; the main axis is X.
    Horizontal,
}

/// Cross-axis alignment policy for items that don't fill the cross axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossAxisAlign {
    /// Align to the cross-axis start edge.
    Start,
    /// Center within the cross axis.
    Center,
    /// Align to the cross-axis end edge.
    End,
    /// Stretch to fill the cross axis.
    Stretch,
}

impl Orientation {
    /// Parse from the string form accepted at the public API boundary.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "vertical" => Some(Self::Vertical),
            "horizontal" => Some(Self::Horizontal),
            _ => None,
        }
    }

    /// CSS custom property name used to apply a cross-axis size.
    pub fn cross_size_property(self) -> &'static str {
        match self {
            Self::Vertical => "width",
            Self::Horizontal => "height",
        }
    }

    /// CSS property name used for the main-axis size.
    pub fn size_property(self) -> &'static str {
        match self {
            Self::Vertical => "height",
            Self::Horizontal => "width",
        }
    }

    /// Auto-detect an orientation from a container's aspect ratio, per spec
    /// §4.6 ("selects horizontal if the container's aspect ratio exceeds
    /// 1.5"). `width` and `height` are in pixels.
    pub fn auto_detect(width: f64, height: f64) -> Self {
        if height > 0.0 && width / height > 1.5 {
            Self::Horizontal
        } else {
            Self::Vertical
        }
    }

    /// Build the CSS `transform` value that positions an item at `position`
    /// pixels along the main axis, honoring `reverse`.
    ///
    /// When `reverse` is set, position is mirrored: `total - position - size`
    /// (spec §4.6 "Reverse").
    fn transform_value(self, position: f64, size: f64, total: f64, reverse: bool) -> String {
        let offset = if reverse { total - position - size } else { position };
        match self {
            Self::Vertical => format!("translateY({offset}px)"),
            Self::Horizontal => format!("translateX({offset}px)"),
        }
    }

    /// Apply absolute positioning and cross-axis alignment to a rendered item
    /// element, per spec §4.5/§4.6.
    pub fn position_item_element(
        self,
        el: &Element,
        position: f64,
        size: f64,
        total_virtual_size: f64,
        reverse: bool,
        cross_align: CrossAxisAlign,
        cross_size: Option<f64>,
    ) {
        let html_el: &web_sys::HtmlElement = el.unchecked_into_ref();
        let style = html_el.style();
        let _ = style.set_property("position", "absolute");
        let transform = self.transform_value(position, size, total_virtual_size, reverse);
        let _ = style.set_property("transform", &transform);
        let _ = style.set_property(self.size_property(), &format!("{size}px"));

        match (cross_align, cross_size) {
            (CrossAxisAlign::Stretch, _) => {
                let _ = style.set_property(self.cross_size_property(), "100%");
            }
            (_, Some(cross)) => {
                let _ = style.set_property(self.cross_size_property(), &format!("{cross}px"));
                match (self, cross_align) {
                    (Self::Vertical, CrossAxisAlign::Center) => {
                        let _ = style.set_property("margin-left", "auto");
                        let _ = style.set_property("margin-right", "auto");
                    }
                    (Self::Vertical, CrossAxisAlign::End) => {
                        let _ = style.set_property("margin-left", "auto");
                    }
                    (Self::Horizontal, CrossAxisAlign::Center) => {
                        let _ = style.set_property("margin-top", "auto");
                        let _ = style.set_property("margin-bottom", "auto");
                    }
                    (Self::Horizontal, CrossAxisAlign::End) => {
                        let _ = style.set_property("margin-top", "auto");
                    }
                    _ => {}
                }
            }
            (_, None) => {}
        }
    }
}

/// Small helper trait so [`Orientation::position_item_element`] can accept a
/// plain [`Element`] without pulling in `JsCast` at every call site.
trait UncheckedIntoRef<T> {
    fn unchecked_into_ref(&self) -> &T;
}

impl UncheckedIntoRef<web_sys::HtmlElement> for Element {
    fn unchecked_into_ref(&self) -> &web_sys::HtmlElement {
        use wasm_bindgen::JsCast;
        self.unchecked_ref::<web_sys::HtmlElement>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_strings() {
        assert_eq!(Orientation::parse("vertical"), Some(Orientation::Vertical));
        assert_eq!(Orientation::parse("horizontal"), Some(Orientation::Horizontal));
        assert_eq!(Orientation::parse("diagonal"), None);
    }

    #[test]
    fn auto_detect_picks_horizontal_past_threshold() {
        assert_eq!(Orientation::auto_detect(100.0, 100.0), Orientation::Vertical);
        assert_eq!(Orientation::auto_detect(151.0, 100.0), Orientation::Horizontal);
        assert_eq!(Orientation::auto_detect(149.0, 100.0), Orientation::Vertical);
    }

    #[test]
    fn transform_value_reverses_around_total() {
        assert_eq!(
            Orientation::Vertical.transform_value(10.0, 20.0, 100.0, false),
            "translateY(10px)"
        );
        assert_eq!(
            Orientation::Vertical.transform_value(10.0, 20.0, 100.0, true),
            "translateY(70px)"
        );
    }
}
