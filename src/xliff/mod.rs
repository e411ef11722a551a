/*!
 * Reading XLIFF 2 inline markup.
 *
 * The writer side lives in `render::xliff`; this module turns inline markup
 * back into fragments through the regular producer operations, so the
 * rebuilt fragment obeys the same pairing rules as one built by hand.
 */

pub mod reader;

pub use reader::InlineReader;
