/*!
 * Tests for language and locale utility functions
 */

use codedtext::language_utils::{
    LanguageCodeType, get_language_name, is_valid_locale, language_codes_match, normalize_to_part2t, primary_subtag,
    validate_language_code,
};

/// Test validation of language codes
#[test]
fn test_validate_language_code_withValidCodes_shouldReturnCorrectType() {
    assert!(matches!(validate_language_code("en").unwrap(), LanguageCodeType::Part1));
    assert!(matches!(validate_language_code("fra").unwrap(), LanguageCodeType::Part2T));
    assert!(matches!(validate_language_code("ger").unwrap(), LanguageCodeType::Part2B));
    assert!(validate_language_code("xyz").is_err());
    assert!(validate_language_code("e").is_err());
}

/// Test normalization and names
#[test]
fn test_normalize_to_part2t_withValidCodes_shouldNormalizeCorrectly() {
    assert_eq!(normalize_to_part2t("en").unwrap(), "eng");
    assert_eq!(normalize_to_part2t("fre").unwrap(), "fra");
    assert_eq!(get_language_name("de").unwrap(), "German");
}

/// Locales are checked subtag by subtag
#[test]
fn test_isValidLocale_withRegionsAndScripts_shouldValidate() {
    assert!(is_valid_locale("fr"));
    assert!(is_valid_locale("fr-CA"));
    assert!(is_valid_locale("zh-Hant-TW"));
    assert!(is_valid_locale("de_CH"));
    assert!(!is_valid_locale(""));
    assert!(!is_valid_locale("fr-"));
    assert!(!is_valid_locale("not a locale"));
    assert_eq!(primary_subtag("pt-BR"), "pt");
}

/// Codes of different ISO parts and regions match on their language
#[test]
fn test_language_codes_match_withEquivalentCodes_shouldMatch() {
    assert!(language_codes_match("fr", "fra"));
    assert!(language_codes_match("fr-CA", "fre"));
    assert!(!language_codes_match("fr", "de"));
    assert!(!language_codes_match("xx", "xx"));
}
